//! Scripted firmware for integration tests.
//!
//! Implements both halves of a [`Link`]: every command frame the session
//! writes is recorded and handed to a responder, whose reply frames are
//! queued for the reader. Tests can also inject unsolicited reports.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use telemetrix_esp32::app::ports::{
    CommandSink, NotificationHandler, NotificationSource, ReportSource,
};
use telemetrix_esp32::error::TransportError;
use telemetrix_esp32::{Callback, Link, ReportEvent, SessionConfig};

/// `[len, 5, major, minor, patch]`
pub const FIRMWARE_1_0_3: [u8; 5] = [4, 5, 1, 0, 3];
/// GET_FIRMWARE_VERSION as the session sends it.
pub const GET_FIRMWARE_VERSION: [u8; 2] = [1, 5];
pub const ENABLE_ALL_REPORTS: [u8; 2] = [1, 16];
pub const STOP_ALL_REPORTS: [u8; 2] = [1, 14];
pub const RESET: [u8; 2] = [1, 20];

/// Maps one command frame to zero or more reply frames.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

// ── Shared state ──────────────────────────────────────────────

struct Wire {
    written: Vec<Vec<u8>>,
    inbound: VecDeque<u8>,
    responder: Responder,
    closed: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Answers the version request and nothing else.
pub fn handshake_only() -> Responder {
    Box::new(|frame: &[u8]| {
        if frame == GET_FIRMWARE_VERSION {
            vec![FIRMWARE_1_0_3.to_vec()]
        } else {
            Vec::new()
        }
    })
}

/// Never answers anything.
pub fn silent() -> Responder {
    Box::new(|_: &[u8]| Vec::new())
}

// ── MockFirmware ──────────────────────────────────────────────

#[derive(Clone)]
pub struct MockFirmware {
    wire: Arc<Mutex<Wire>>,
}

#[allow(dead_code)]
impl MockFirmware {
    pub fn new(responder: Responder) -> Self {
        Self {
            wire: Arc::new(Mutex::new(Wire {
                written: Vec::new(),
                inbound: VecDeque::new(),
                responder,
                closed: false,
            })),
        }
    }

    /// A pull-style link over this firmware.
    pub fn link(&self) -> Link {
        Link::Pull {
            sink: Box::new(MockSink { fw: self.clone() }),
            source: Box::new(MockSource { fw: self.clone() }),
        }
    }

    /// Queue a raw report frame for the reader.
    pub fn inject(&self, frame: &[u8]) {
        lock(&self.wire).inbound.extend(frame.iter().copied());
    }

    /// Make the next read fail as a closed peer.
    pub fn hang_up(&self) {
        lock(&self.wire).closed = true;
    }

    /// Every command frame written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.wire).written.clone()
    }

    pub fn written_count(&self) -> usize {
        lock(&self.wire).written.len()
    }

    /// Frames written after the first `skip`.
    pub fn written_since(&self, skip: usize) -> Vec<Vec<u8>> {
        lock(&self.wire).written.iter().skip(skip).cloned().collect()
    }

    fn record(&self, frame: &[u8]) -> Vec<Vec<u8>> {
        let mut wire = lock(&self.wire);
        wire.written.push(frame.to_vec());
        (wire.responder)(frame)
    }
}

struct MockSink {
    fw: MockFirmware,
}

impl CommandSink for MockSink {
    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        for reply in self.fw.record(frame) {
            self.fw.inject(&reply);
        }
        Ok(())
    }
}

struct MockSource {
    fw: MockFirmware,
}

impl ReportSource for MockSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        {
            let mut wire = lock(&self.fw.wire);
            if wire.closed {
                return Err(TransportError::Closed);
            }
            if wire.inbound.len() >= buf.len() {
                for b in buf.iter_mut() {
                    *b = wire.inbound.pop_front().unwrap_or_default();
                }
                return Ok(());
            }
        }
        std::thread::sleep(Duration::from_millis(2));
        Err(TransportError::Timeout)
    }
}

// ── Push-style link ───────────────────────────────────────────

/// GATT-style link: replies are delivered straight into the subscribed
/// handler from the writing thread.
#[derive(Clone, Default)]
pub struct MockGatt {
    handler: Arc<Mutex<Option<NotificationHandler>>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[allow(dead_code)]
impl MockGatt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self) -> Link {
        Link::Push {
            sink: Box::new(GattSink { gatt: self.clone() }),
            notifications: Box::new(GattNotify { gatt: self.clone() }),
        }
    }

    /// Deliver one notification buffer.
    pub fn notify(&self, data: &[u8]) {
        if let Some(handler) = lock(&self.handler).as_mut() {
            handler(data);
        }
    }

    pub fn subscribed(&self) -> bool {
        lock(&self.handler).is_some()
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.written).clone()
    }
}

struct GattSink {
    gatt: MockGatt,
}

impl CommandSink for GattSink {
    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        lock(&self.gatt.written).push(frame.to_vec());
        if frame == GET_FIRMWARE_VERSION {
            self.gatt.notify(&FIRMWARE_1_0_3);
        }
        Ok(())
    }
}

struct GattNotify {
    gatt: MockGatt,
}

impl NotificationSource for GattNotify {
    fn subscribe(&mut self, handler: NotificationHandler) -> Result<(), TransportError> {
        *lock(&self.gatt.handler) = Some(handler);
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<(), TransportError> {
        *lock(&self.gatt.handler) = None;
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Short timeouts so failing tests fail fast. Fault shutdown is off so a
/// rejected argument leaves the session usable for the next assertion.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        shutdown_on_fault: false,
        firmware_timeout_ms: 500,
        reset_settle_ms: 0,
        poll_interval_ms: 5,
        onewire_reply_timeout_ms: 500,
        onewire_conversion_ms: 0,
        ..SessionConfig::default()
    }
}

/// A callback that forwards every event into a channel.
pub fn channel_callback() -> (Callback, Receiver<ReportEvent>) {
    let (tx, rx) = unbounded();
    let cb: Callback = Box::new(move |e: &ReportEvent| {
        let _ = tx.send(e.clone());
    });
    (cb, rx)
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
