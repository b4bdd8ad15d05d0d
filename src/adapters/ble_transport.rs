//! BLE transport: Telemetrix frames over the Nordic UART service.
//!
//! The firmware exposes NUS. The client writes command frames to the RX
//! characteristic and receives reports as notifications on the TX
//! characteristic (named from the peripheral's point of view).
//!
//! ## GATT service layout
//!
//! | Characteristic | UUID                                   | Perms  |
//! |----------------|----------------------------------------|--------|
//! | NUS service    | `6e400001-b5a3-f393-e0a9-e50e24dcca9e` |        |
//! | RX (write)     | `6e400002-b5a3-f393-e0a9-e50e24dcca9e` | Write  |
//! | TX (notify)    | `6e400003-b5a3-f393-e0a9-e50e24dcca9e` | Notify |
//!
//! ## MTU
//!
//! A command frame longer than the ATT payload (`mtu - 3`) is split into
//! consecutive writes. NUS is a byte stream, so the chunks carry no
//! header; the firmware reassembles them by the frame's length byte.
//!
//! The radio stack itself is not part of this crate: callers provide a
//! [`GattClient`] for a connected peripheral.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};

use crate::app::Link;
use crate::app::ports::{CommandSink, NotificationHandler, NotificationSource};
use crate::error::TransportError;
use crate::protocol::dispatcher::lock;

// ── Constants ────────────────────────────────────────────────

pub const NUS_SERVICE: u128 = 0x6e400001_b5a3_f393_e0a9_e50e24dcca9e;
pub const NUS_RX_CHAR: u128 = 0x6e400002_b5a3_f393_e0a9_e50e24dcca9e;
pub const NUS_TX_CHAR: u128 = 0x6e400003_b5a3_f393_e0a9_e50e24dcca9e;

/// BLE 4.x default.
pub const DEFAULT_MTU: usize = 23;
const ATT_HEADER: usize = 3;

type TransportResult<T> = core::result::Result<T, TransportError>;

/// The GATT operations the transport needs from a connected peripheral.
pub trait GattClient: Send {
    /// Write without response.
    fn write(&mut self, characteristic: u128, data: &[u8]) -> TransportResult<()>;

    fn start_notify(
        &mut self,
        characteristic: u128,
        handler: NotificationHandler,
    ) -> TransportResult<()>;

    fn stop_notify(&mut self, characteristic: u128) -> TransportResult<()>;

    /// Negotiated ATT MTU.
    fn mtu(&self) -> usize {
        DEFAULT_MTU
    }
}

// ── Transport ────────────────────────────────────────────────

pub struct BleTransport<G: GattClient + 'static> {
    client: Arc<Mutex<G>>,
    write_pacing: Option<Duration>,
}

impl<G: GattClient + 'static> BleTransport<G> {
    pub fn new(client: G) -> Self {
        info!("BLE: NUS transport (MTU={})", client.mtu());
        Self {
            client: Arc::new(Mutex::new(client)),
            write_pacing: None,
        }
    }

    /// Sleep between consecutive writes; some stacks drop back-to-back
    /// writes without response.
    pub fn with_write_pacing(mut self, pacing: Duration) -> Self {
        self.write_pacing = Some(pacing);
        self
    }

    pub fn into_link(self) -> Link {
        Link::Push {
            sink: Box::new(BleCommandSink {
                client: Arc::clone(&self.client),
                pacing: self.write_pacing,
            }),
            notifications: Box::new(BleNotifications {
                client: self.client,
            }),
        }
    }
}

struct BleCommandSink<G: GattClient> {
    client: Arc<Mutex<G>>,
    pacing: Option<Duration>,
}

impl<G: GattClient> CommandSink for BleCommandSink<G> {
    fn write(&mut self, frame: &[u8]) -> TransportResult<()> {
        let mut client = lock(&self.client);
        let chunk = client.mtu().saturating_sub(ATT_HEADER).max(1);
        for piece in frame.chunks(chunk) {
            client.write(NUS_RX_CHAR, piece)?;
            if let Some(pause) = self.pacing {
                std::thread::sleep(pause);
            }
        }
        if frame.len() > chunk {
            debug!("BLE: {} byte frame sent in {chunk} byte chunks", frame.len());
        }
        Ok(())
    }
}

struct BleNotifications<G: GattClient> {
    client: Arc<Mutex<G>>,
}

impl<G: GattClient> NotificationSource for BleNotifications<G> {
    fn subscribe(&mut self, handler: NotificationHandler) -> TransportResult<()> {
        lock(&self.client).start_notify(NUS_TX_CHAR, handler)
    }

    fn unsubscribe(&mut self) -> TransportResult<()> {
        lock(&self.client).stop_notify(NUS_TX_CHAR)
    }
}
