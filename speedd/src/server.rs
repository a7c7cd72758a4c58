use crate::engine::TicketEngine;
use crate::error::{SessionError, Violation};
use crate::models::Observation;
use crate::parser;
use crate::registry::DispatcherRegistry;
use crate::session::Session;
use crate::store::ObservationStore;
use crate::types::{MileMarker, RoadId, SpeedLimit};
use crate::utils;
use crate::wire::Message;
use common::BUFFER_SIZE;
use log::{debug, error, info, trace, warn};
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

/// What a connection has identified itself as. Every connection starts
/// unidentified and may declare a role exactly once.
#[derive(Clone, Copy)]
enum Role {
    Unidentified,
    Camera {
        road: RoadId,
        mile: MileMarker,
        limit: SpeedLimit,
    },
    Dispatcher,
}

pub struct Server {
    store: Arc<ObservationStore>,
    registry: Arc<DispatcherRegistry>,
    observations: Sender<Observation>,
    next_id: AtomicU64,
}

impl Server {
    pub fn new() -> Self {
        let store = Arc::new(ObservationStore::default());
        let registry = Arc::new(DispatcherRegistry::default());
        let (observations, inbox) = mpsc::channel::<Observation>();
        let engine = TicketEngine::new(Arc::clone(&store), Arc::clone(&registry));
        thread::spawn(move || engine.run(inbox));
        Self {
            store,
            registry,
            observations,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn run(self, listener: TcpListener) -> ! {
        let server = Arc::new(self);
        loop {
            match listener.accept() {
                Ok((stream, address)) => {
                    let server = Arc::clone(&server);
                    let id = server.next_id.fetch_add(1, Ordering::Relaxed);
                    info!("connection {id}: accepted from {address}");
                    if let Err(err) = thread::Builder::new()
                        .name(format!("connection-{id}"))
                        .spawn(move || handle_connection(server, id, stream))
                    {
                        error!("connection {id}: could not spawn handler: {err}");
                    }
                }
                Err(err) => warn!("could not accept connection: {err}"),
            }
        }
    }

    /// Advance one connection's state machine by one message.
    fn apply(
        &self,
        session: &Arc<Session>,
        role: &mut Role,
        message: Message,
    ) -> Result<(), SessionError> {
        let tag = message.tag();
        match message {
            Message::WantHeartbeat(interval) => session.request_heartbeat(interval),
            Message::IAmCamera(road, mile, limit) => match role {
                Role::Unidentified => {
                    info!(
                        "connection {}: camera on road {road} at mile {mile} (limit {limit} mph)",
                        session.id()
                    );
                    *role = Role::Camera { road, mile, limit };
                    Ok(())
                }
                _ => Err(Violation::AlreadyIdentified.into()),
            },
            Message::IAmDispatcher(roads) => match role {
                Role::Unidentified => {
                    info!("connection {}: dispatcher for roads {roads:?}", session.id());
                    self.registry.register(session, &roads);
                    *role = Role::Dispatcher;
                    Ok(())
                }
                _ => Err(Violation::AlreadyIdentified.into()),
            },
            Message::Plate(plate, timestamp) => match *role {
                Role::Camera { road, mile, limit } => {
                    debug!(
                        "connection {}: plate {} at {timestamp}",
                        session.id(),
                        String::from_utf8_lossy(&plate),
                    );
                    let observation = Observation {
                        plate,
                        road,
                        mile,
                        limit,
                        timestamp,
                    };
                    self.store.append(observation.clone());
                    self.observations.send(observation).map_err(|_| {
                        SessionError::Resource("ticket engine is gone".to_string())
                    })?;
                    Ok(())
                }
                _ => Err(Violation::IllegalMessage(tag).into()),
            },
            // Error, Ticket and Heartbeat frames only ever travel
            // server-to-client.
            _ => Err(Violation::IllegalMessage(tag).into()),
        }
    }
}

fn handle_connection(server: Arc<Server>, id: u64, stream: TcpStream) {
    let session = match Session::new(id, &stream) {
        Ok(session) => Arc::new(session),
        Err(err) => {
            warn!("connection {id}: could not set up session: {err}");
            return;
        }
    };

    let mut role = Role::Unidentified;
    match drive(&server, &session, stream, &mut role) {
        Ok(()) => info!("connection {id}: peer closed"),
        Err(err) => {
            warn!("connection {id}: {err}");
            if let Some(text) = err.error_frame() {
                _ = session.write(&Message::Error(text.into_bytes()));
            }
        }
    }

    if matches!(role, Role::Dispatcher) {
        server.registry.unregister(session.id());
    }
    session.close();
}

/// Read loop for one connection: accumulate bytes, drain complete frames,
/// and feed them through the state machine until the peer closes or a
/// violation ends the conversation.
fn drive(
    server: &Server,
    session: &Arc<Session>,
    mut stream: TcpStream,
    role: &mut Role,
) -> Result<(), SessionError> {
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        while let Some((message, consumed)) = parser::decode(&pending)? {
            pending.drain(..consumed);
            server.apply(session, role, message)?;
        }
        match stream.read(&mut buffer) {
            Ok(0) => {
                if pending.is_empty() {
                    return Ok(());
                }
                return Err(parser::classify_truncation(&pending).into());
            }
            Ok(n) => {
                trace!("{}: <<< {}", session.id(), utils::u8s_to_hex_str(&buffer[..n]));
                pending.extend_from_slice(&buffer[..n]);
            }
            Err(err) => return Err(SessionError::Transport(err)),
        }
    }
}
