use crate::error::SessionError;
use crate::session::Session;
use crate::types::HeartbeatInterval;
use crate::wire::Message;
use log::debug;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The wire interval unit is 100ms.
pub(crate) const DECISECOND: Duration = Duration::from_millis(100);

/// Ownership of a running heartbeat task. Dropping the stop channel wakes
/// the task immediately, so teardown never waits out a full interval.
pub(crate) struct Handle {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl Handle {
    pub(crate) fn stop(self) {
        drop(self.stop);
        _ = self.thread.join();
    }
}

pub(crate) fn spawn(
    session: Arc<Session>,
    interval: HeartbeatInterval,
) -> Result<Handle, SessionError> {
    let (stop, ticks) = mpsc::channel::<()>();
    let period = DECISECOND * interval;
    let thread = thread::Builder::new()
        .name(format!("heartbeat-{}", session.id()))
        .spawn(move || emit(session, ticks, period))
        .map_err(|err| SessionError::Resource(format!("could not start heartbeat task: {err}")))?;
    Ok(Handle { stop, thread })
}

fn emit(session: Arc<Session>, stop: Receiver<()>, period: Duration) {
    debug!("session {}: heartbeat every {period:?}", session.id());
    loop {
        match stop.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {
                if session.write(&Message::Heartbeat).is_err() {
                    break;
                }
            }
            _ => break,
        }
    }
}
