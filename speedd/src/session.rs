use crate::error::{SessionError, Violation};
use crate::heartbeat;
use crate::types::HeartbeatInterval;
use crate::utils;
use crate::wire::Message;
use log::{debug, trace};
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// The server-side half of one client connection.
///
/// Reading stays with the connection's handler thread; the session owns the
/// write side. Writes are serialized through a lock because a dispatcher's
/// stream is written from two places at once: its heartbeat task and the
/// ticket dispatch path.
pub(crate) struct Session {
    id: u64,
    socket: TcpStream,
    writer: Mutex<TcpStream>,
    heartbeat: Mutex<HeartbeatSlot>,
    closed: AtomicBool,
}

#[derive(Default)]
struct HeartbeatSlot {
    requested: bool,
    task: Option<heartbeat::Handle>,
}

impl Session {
    pub(crate) fn new(id: u64, stream: &TcpStream) -> std::io::Result<Self> {
        Ok(Self {
            id,
            socket: stream.try_clone()?,
            writer: Mutex::new(stream.try_clone()?),
            heartbeat: Mutex::new(HeartbeatSlot::default()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Serialize one frame and deliver it under the write lock.
    pub(crate) fn write(&self, message: &Message) -> Result<(), SessionError> {
        let bytes = message.to_bytes()?;
        let mut writer = self.writer.lock().unwrap();
        trace!("{}: >>> {}", self.id, utils::u8s_to_hex_str(&bytes));
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Record a WantHeartbeat request. The first request latches, whatever
    /// its interval; a second request on the same connection is a protocol
    /// violation. A zero interval latches without spawning an emitter.
    pub(crate) fn request_heartbeat(
        self: &Arc<Self>,
        interval: HeartbeatInterval,
    ) -> Result<(), SessionError> {
        let mut slot = self.heartbeat.lock().unwrap();
        if slot.requested {
            return Err(Violation::MultipleWantHeartbeat.into());
        }
        slot.requested = true;
        if interval > 0 {
            slot.task = Some(heartbeat::spawn(Arc::clone(self), interval)?);
        }
        Ok(())
    }

    /// Shut the stream down and stop the heartbeat task. Idempotent.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        _ = self.socket.shutdown(Shutdown::Both);
        let task = self.heartbeat.lock().unwrap().task.take();
        if let Some(task) = task {
            task.stop();
        }
        debug!("session {} closed", self.id);
    }
}
