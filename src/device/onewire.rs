//! OneWire bus controller.
//!
//! Builds device discovery and DS18x20 temperature reads out of the
//! primitive OneWire commands. Every OneWire answer arrives as the same
//! report id with a sub-type byte; the router installed by
//! [`OneWireBus::attach`] demultiplexes those into per-step replies.
//!
//! Temperature cycle:
//! ```text
//!   reset ─▶ skip|select ─▶ write 0x44 (power) ─▶ wait conversion
//!   reset ─▶ skip|select ─▶ write 0xBE ─▶ read ×9 ─▶ CRC-8(bytes 0..8) == byte 8
//! ```
//! Discovery:
//! ```text
//!   reset_search ─▶ search … until FF FF FF FF FF FF FF FF
//!                   └─ each address: CRC-8(bytes 0..7) == byte 7
//! ```
//! A CRC mismatch is a hard fault; nothing is retried.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crc::{CRC_8_MAXIM_DOW, Crc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use heapless::Vec;
use log::{debug, info, warn};

use crate::app::ports::OneWireLink;
use crate::device::registry::Callback;
use crate::error::{DeviceFault, Error, ProtocolFault, Resource, Result};
use crate::protocol::dispatcher::lock;
use crate::protocol::opcodes::{Opcode, ReportId};
use crate::protocol::report::{Report, ReportEvent};

/// Scratchpad length, CRC byte included.
pub const SCRATCHPAD_LEN: usize = 9;
/// Devices `discover` will collect before giving up.
pub const MAX_DEVICES: usize = 8;

/// Replies buffered between the reader and the caller. Every step waits
/// for its reply before the next request, so only stale answers queue up.
pub const REPLY_QUEUE: usize = 2 * SCRATCHPAD_LEN;

pub const CMD_CONVERT_T: u8 = 0x44;
pub const CMD_READ_SCRATCHPAD: u8 = 0xBE;

const SUB_RESET: u8 = Opcode::OneWireReset.code();
const SUB_READ: u8 = Opcode::OneWireRead.code();
const SUB_SEARCH: u8 = Opcode::OneWireSearch.code();
const SUB_CRC8: u8 = Opcode::OneWireCrc8.code();

const END_OF_SEARCH: [u8; 8] = [0xFF; 8];

const DALLAS: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// Dallas/Maxim CRC-8, as the firmware's `OneWire::crc8` computes it.
pub fn crc8(bytes: &[u8]) -> u8 {
    DALLAS.checksum(bytes)
}

/// Temperature sensor families by ROM family code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFamily {
    Ds18s20,
    Ds18b20,
    Ds1822,
}

impl SensorFamily {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(Self::Ds18s20),
            0x28 => Some(Self::Ds18b20),
            0x22 => Some(Self::Ds1822),
            _ => None,
        }
    }
}

/// Per-bus scratch state, owned by one [`OneWireBus`].
#[derive(Debug, Default)]
pub struct OneWireSession {
    /// Last address returned by a search.
    pub address: Option<[u8; 8]>,
    pub temperature_buffer: Vec<u8, SCRATCHPAD_LEN>,
    /// Check byte the next CRC reply is compared against.
    pub crc_comparator: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Reset(u8),
    Byte(u8),
    Search([u8; 8]),
    Crc(u8),
}

pub struct OneWireBus<'a, L: OneWireLink + ?Sized> {
    link: &'a L,
    session: Arc<Mutex<OneWireSession>>,
    replies: Receiver<Reply>,
    reply_timeout: Duration,
    conversion_delay: Duration,
}

impl<'a, L: OneWireLink + ?Sized> OneWireBus<'a, L> {
    /// Initialise the bus on `pin` and take ownership of its reports.
    pub fn attach(
        link: &'a L,
        pin: u8,
        reply_timeout: Duration,
        conversion_delay: Duration,
    ) -> Result<Self> {
        let session = Arc::new(Mutex::new(OneWireSession::default()));
        let (tx, replies) = bounded(REPLY_QUEUE);
        link.attach(pin, router(Arc::clone(&session), tx))?;
        info!("onewire: bus attached on GPIO {pin}");
        Ok(Self {
            link,
            session,
            replies,
            reply_timeout,
            conversion_delay,
        })
    }

    pub fn session(&self) -> MutexGuard<'_, OneWireSession> {
        lock(&self.session)
    }

    /// Reset pulse; fails when no device answers with a presence pulse.
    pub fn reset(&self) -> Result<()> {
        self.drain();
        self.link.reset()?;
        let presence = self.await_reply(|r| match r {
            Reply::Reset(v) => Some(v),
            _ => None,
        })?;
        if presence == 0 {
            return Err(DeviceFault::NoPresencePulse.into());
        }
        Ok(())
    }

    /// Enumerate every device on the bus, validating each ROM CRC.
    pub fn discover(&self) -> Result<Vec<[u8; 8], MAX_DEVICES>> {
        self.drain();
        let mut found = Vec::new();
        self.link.reset_search()?;

        loop {
            self.link.search()?;
            let address = self.await_reply(|r| match r {
                Reply::Search(a) => Some(a),
                _ => None,
            })?;
            if address == END_OF_SEARCH || found.contains(&address) {
                break;
            }

            self.verify_crc(&address)?;
            debug!("onewire: found {:02x?}", address);
            found
                .push(address)
                .map_err(|_| Error::ResourceExhausted(Resource::OneWireDevices))?;
        }

        info!("onewire: {} device(s) on the bus", found.len());
        Ok(found)
    }

    /// One full conversion + scratchpad read. `None` addresses every device
    /// (skip ROM), which only makes sense with a single sensor on the bus.
    pub fn read_temperature(&self, address: Option<&[u8; 8]>) -> Result<f32> {
        if let Some(addr) = address {
            match SensorFamily::from_code(addr[0]) {
                Some(SensorFamily::Ds18b20 | SensorFamily::Ds1822) => {}
                _ => return Err(DeviceFault::UnsupportedSensor { family: addr[0] }.into()),
            }
        }

        self.reset()?;
        self.address(address)?;
        self.link.write(CMD_CONVERT_T, true)?;
        std::thread::sleep(self.conversion_delay);

        self.reset()?;
        self.address(address)?;
        self.link.write(CMD_READ_SCRATCHPAD, false)?;

        self.session().temperature_buffer.clear();
        for _ in 0..SCRATCHPAD_LEN {
            self.link.read()?;
            self.await_reply(|r| match r {
                Reply::Byte(b) => Some(b),
                _ => None,
            })?;
        }

        let scratchpad = {
            let mut s = self.session();
            let bytes = s.temperature_buffer.clone();
            s.temperature_buffer.clear();
            bytes
        };
        if scratchpad.len() != SCRATCHPAD_LEN {
            return Err(ProtocolFault::Truncated {
                report: ReportId::OneWire,
                len: scratchpad.len(),
            }
            .into());
        }
        self.verify_crc(&scratchpad)?;

        let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
        Ok(f32::from(raw) / 16.0)
    }

    fn address(&self, address: Option<&[u8; 8]>) -> Result<()> {
        match address {
            Some(addr) => self.link.select(addr),
            None => self.link.skip(),
        }
    }

    /// Ask the firmware for CRC-8 over all but the last byte and compare
    /// with the last byte.
    fn verify_crc(&self, bytes: &[u8]) -> Result<()> {
        let Some(&expected) = bytes.last() else {
            return Ok(());
        };
        self.session().crc_comparator = Some(expected);
        self.link.crc8(bytes)?;
        let computed = self.await_reply(|r| match r {
            Reply::Crc(c) => Some(c),
            _ => None,
        })?;
        if computed != expected {
            warn!("onewire: CRC invalid over {:02x?}", bytes);
            return Err(DeviceFault::CrcMismatch { expected, computed }.into());
        }
        Ok(())
    }

    /// Wait for the next reply `pick` accepts, skipping anything else.
    fn await_reply<T>(&self, pick: impl Fn(Reply) -> Option<T>) -> Result<T> {
        let deadline = Instant::now() + self.reply_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) => match pick(reply) {
                    Some(v) => return Ok(v),
                    None => debug!("onewire: skipping stale {reply:?}"),
                },
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return Err(ProtocolFault::ReplyTimeout(ReportId::OneWire).into());
                }
            }
        }
    }

    fn drain(&self) {
        while let Ok(stale) = self.replies.try_recv() {
            debug!("onewire: dropping stale {stale:?}");
        }
    }
}

/// Report router: sub-type demultiplex into replies, with the session
/// bookkeeping each step needs.
fn router(session: Arc<Mutex<OneWireSession>>, tx: Sender<Reply>) -> Callback {
    Box::new(move |event: &ReportEvent| {
        let Report::OneWire { subtype, data } = &event.report else {
            return;
        };
        let reply = match (*subtype, data.as_slice()) {
            (SUB_RESET, [result, ..]) => Reply::Reset(*result),
            (SUB_READ, [byte, ..]) => {
                if lock(&session).temperature_buffer.push(*byte).is_err() {
                    warn!("onewire: scratchpad buffer full, dropping {byte:#04x}");
                }
                Reply::Byte(*byte)
            }
            (SUB_SEARCH, [a0, a1, a2, a3, a4, a5, a6, a7, ..]) => {
                let address = [*a0, *a1, *a2, *a3, *a4, *a5, *a6, *a7];
                let mut s = lock(&session);
                s.address = Some(address);
                s.crc_comparator = Some(address[7]);
                Reply::Search(address)
            }
            (SUB_CRC8, [crc, ..]) => Reply::Crc(*crc),
            (other, bytes) => {
                debug!("onewire: ignoring sub-type {other} ({} bytes)", bytes.len());
                return;
            }
        };
        // Never block the reader. A full queue means nobody is waiting, and
        // a dropped bus makes every reply late.
        match tx.try_send(reply) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(late)) => {
                warn!("onewire: reply queue full, dropping {late:?}");
            }
        }
    })
}
