use crate::models::Ticket;
use crate::session::Session;
use crate::types::RoadId;
use crate::wire::Message;
use log::{debug, info, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Road subscriptions of connected dispatchers, plus the queue of tickets
/// for roads nobody covers yet.
///
/// One lock guards both tables. The lock order everywhere is registry
/// before session write lock; `register` keeps the registry locked while it
/// drains a road's queue so that a concurrently generated ticket cannot
/// overtake the queued ones.
#[derive(Default)]
pub(crate) struct DispatcherRegistry {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    dispatchers: HashMap<RoadId, Vec<Arc<Session>>>,
    pending: HashMap<RoadId, VecDeque<Ticket>>,
}

impl DispatcherRegistry {
    /// Subscribe a dispatcher session to its roads, then hand it every
    /// queued ticket those roads have accumulated, oldest first.
    pub(crate) fn register(&self, session: &Arc<Session>, roads: &[RoadId]) {
        let mut tables = self.tables.lock().unwrap();
        for road in roads {
            tables
                .dispatchers
                .entry(*road)
                .or_default()
                .push(Arc::clone(session));
        }
        for road in roads {
            let Some(queue) = tables.pending.get_mut(road) else {
                continue;
            };
            while let Some(ticket) = queue.pop_front() {
                debug!(
                    "session {}: draining queued ticket for road {road}",
                    session.id()
                );
                if session.write(&Message::Ticket(ticket.clone())).is_err() {
                    // The dispatcher died mid-drain; its handler thread
                    // will unregister it. Keep the ticket for the next one.
                    queue.push_front(ticket);
                    return;
                }
            }
        }
    }

    /// Drop the session from every road it subscribed to. Queued tickets
    /// are untouched.
    pub(crate) fn unregister(&self, id: u64) {
        let mut tables = self.tables.lock().unwrap();
        for sessions in tables.dispatchers.values_mut() {
            sessions.retain(|session| session.id() != id);
        }
    }

    /// Send a ticket to the first dispatcher covering its road, or queue it
    /// until one registers. The registry lock is held for the selection
    /// only; the write happens under the session's own lock.
    pub(crate) fn dispatch(&self, ticket: Ticket) {
        let chosen = {
            let tables = self.tables.lock().unwrap();
            tables
                .dispatchers
                .get(&ticket.road)
                .and_then(|sessions| sessions.first().cloned())
        };
        let Some(session) = chosen else {
            info!("no dispatcher covers road {}, queueing ticket", ticket.road);
            self.enqueue(ticket);
            return;
        };
        if let Err(err) = session.write(&Message::Ticket(ticket.clone())) {
            warn!(
                "session {}: ticket write failed ({err}), requeueing",
                session.id()
            );
            self.requeue(ticket);
        }
    }

    fn enqueue(&self, ticket: Ticket) {
        let mut tables = self.tables.lock().unwrap();
        tables.pending.entry(ticket.road).or_default().push_back(ticket);
    }

    /// A failed write puts the ticket back at the head of its road's queue.
    fn requeue(&self, ticket: Ticket) {
        let mut tables = self.tables.lock().unwrap();
        tables.pending.entry(ticket.road).or_default().push_front(ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    fn session_pair(id: u64) -> (Arc<Session>, TcpStream) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let address = listener.local_addr().unwrap();
        let client = TcpStream::connect(address).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        (Arc::new(Session::new(id, &accepted).unwrap()), client)
    }

    fn ticket(road: RoadId, timestamp1: u32) -> Ticket {
        Ticket {
            plate: b"UN1X".to_vec(),
            road,
            mile1: 0,
            timestamp1,
            mile2: 1,
            timestamp2: timestamp1 + 45,
            speed: 8000,
        }
    }

    fn read_frames(client: &mut TcpStream, expected: &[Ticket]) {
        let bytes: Vec<u8> = expected
            .iter()
            .flat_map(|t| Message::Ticket(t.clone()).to_bytes().unwrap())
            .collect();
        let mut buffer = vec![0u8; bytes.len()];
        client
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        client.read_exact(&mut buffer).unwrap();
        assert_eq!(bytes, buffer);
    }

    #[test]
    fn register_drains_queued_tickets_in_fifo_order() {
        let registry = DispatcherRegistry::default();
        registry.dispatch(ticket(7, 0));
        registry.dispatch(ticket(7, 100_000));

        let (session, mut client) = session_pair(1);
        registry.register(&session, &[7]);
        read_frames(&mut client, &[ticket(7, 0), ticket(7, 100_000)]);
    }

    #[test]
    fn dispatch_prefers_the_first_registered_dispatcher() {
        let registry = DispatcherRegistry::default();
        let (first, mut first_client) = session_pair(1);
        let (second, mut second_client) = session_pair(2);
        registry.register(&first, &[7]);
        registry.register(&second, &[7]);

        registry.dispatch(ticket(7, 0));
        read_frames(&mut first_client, &[ticket(7, 0)]);

        second_client
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut buffer = [0u8; 1];
        assert!(second_client.read(&mut buffer).is_err());
    }

    #[test]
    fn unregister_leaves_queued_tickets_for_the_next_dispatcher() {
        let registry = DispatcherRegistry::default();
        let (first, _first_client) = session_pair(1);
        registry.register(&first, &[7]);
        registry.unregister(first.id());

        registry.dispatch(ticket(7, 0));

        let (second, mut second_client) = session_pair(2);
        registry.register(&second, &[7]);
        read_frames(&mut second_client, &[ticket(7, 0)]);
    }

    #[test]
    fn tickets_for_uncovered_roads_wait_for_a_matching_registration() {
        let registry = DispatcherRegistry::default();
        let (session, mut client) = session_pair(1);
        registry.register(&session, &[8]);

        registry.dispatch(ticket(7, 0));

        client
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut buffer = [0u8; 1];
        assert!(client.read(&mut buffer).is_err());
    }
}
