//! Port traits: the hexagonal boundary between the protocol engine and the
//! outside world.
//!
//! ```text
//!   TcpTransport / BleTransport ──▶ CommandSink + ReportSource | NotificationSource
//!                                              │
//!                                              ▼
//!                                   Session ──▶ Dispatcher ──▶ Registry
//! ```
//!
//! Adapters implement these traits; the [`Session`](super::Session) consumes
//! them as trait objects, so the engine never touches sockets or GATT
//! handles directly and tests can script both directions of the link.

use std::time::SystemTime;

use crate::error::{Result, TransportError};

// ───────────────────────────────────────────────────────────────
// Outbound (client → firmware)
// ───────────────────────────────────────────────────────────────

/// Write side of the link. One call carries one complete command frame.
pub trait CommandSink: Send {
    fn write(&mut self, frame: &[u8]) -> core::result::Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Inbound, pull style (socket)
// ───────────────────────────────────────────────────────────────

/// Blocking byte source for the reader thread.
pub trait ReportSource: Send {
    /// Fill `buf` completely.
    ///
    /// May return [`TransportError::Timeout`] only when no byte of `buf`
    /// has been read yet, so the loop can look at the shutdown flag
    /// between frames without losing alignment.
    fn read_exact(&mut self, buf: &mut [u8]) -> core::result::Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Inbound, push style (GATT notify)
// ───────────────────────────────────────────────────────────────

/// Called with each notification buffer, in arrival order.
pub type NotificationHandler = Box<dyn FnMut(&[u8]) + Send>;

/// A link that pushes message-bounded buffers at a registered handler.
pub trait NotificationSource: Send {
    fn subscribe(&mut self, handler: NotificationHandler)
    -> core::result::Result<(), TransportError>;

    fn unsubscribe(&mut self) -> core::result::Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Source of the client-side report timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

// ───────────────────────────────────────────────────────────────
// OneWire primitives
// ───────────────────────────────────────────────────────────────

/// The OneWire command surface the bus controller drives.
///
/// `attach` installs the single report router for the bus; every other
/// call only sends a command, and the answer (if any) arrives at the
/// router as a OneWire report with the matching sub-type.
pub trait OneWireLink {
    fn attach(&self, pin: u8, router: crate::device::registry::Callback) -> Result<()>;
    fn reset(&self) -> Result<()>;
    fn select(&self, address: &[u8; 8]) -> Result<()>;
    fn skip(&self) -> Result<()>;
    fn write(&self, data: u8, power: bool) -> Result<()>;
    fn read(&self) -> Result<()>;
    fn reset_search(&self) -> Result<()>;
    fn search(&self) -> Result<()>;
    fn crc8(&self, bytes: &[u8]) -> Result<()>;
}
