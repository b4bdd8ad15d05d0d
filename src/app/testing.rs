//! Offline session for unit tests: commands are recorded, nothing is
//! ever read.

use std::sync::{Arc, Mutex};

use super::ports::{CommandSink, ReportSource};
use super::session::{Link, Session};
use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::protocol::dispatcher::lock;

pub(crate) type Wire = Arc<Mutex<Vec<Vec<u8>>>>;

struct Recorder(Wire);

impl CommandSink for Recorder {
    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        lock(&self.0).push(frame.to_vec());
        Ok(())
    }
}

struct Idle;

impl ReportSource for Idle {
    fn read_exact(&mut self, _: &mut [u8]) -> Result<(), TransportError> {
        Err(TransportError::Timeout)
    }
}

/// A session that was never started, with its command log. Rejected
/// arguments leave it open.
pub(crate) fn offline_session() -> (Session, Wire) {
    offline_session_with(false)
}

pub(crate) fn offline_session_with(shutdown_on_fault: bool) -> (Session, Wire) {
    let wire = Wire::default();
    let config = SessionConfig {
        auto_start: false,
        reset_settle_ms: 0,
        shutdown_on_fault,
        ..SessionConfig::default()
    };
    let link = Link::Pull {
        sink: Box::new(Recorder(Arc::clone(&wire))),
        source: Box::new(Idle),
    };
    let session = Session::new(config, link).unwrap();
    (session, wire)
}

/// Frames written so far, then clear the log.
pub(crate) fn take(wire: &Wire) -> Vec<Vec<u8>> {
    std::mem::take(&mut *lock(wire))
}

pub(crate) fn noop() -> crate::device::registry::Callback {
    Box::new(|_: &crate::protocol::report::ReportEvent| {})
}
