//! Client session.
//!
//! Owns the write half of the link, the [`Dispatcher`] (and through it the
//! device registry), and the single reader. The command surface lives in
//! the sibling `gpio`, `buses` and `motion` modules as further
//! `impl Session` blocks.
//!
//! ```text
//!   new ──▶ (auto_start) start ──▶ GET_FIRMWARE_VERSION ─▶ wait ─▶ ENABLE_ALL_REPORTS
//!                                                          │
//!                                           timeout ──▶ ProtocolMismatch
//!   shutdown ──▶ flag ─▶ STOP_ALL_REPORTS ─▶ [RESET ─▶ settle] ─▶ join / unsubscribe
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use super::ports::{Clock, CommandSink, NotificationSource, ReportSource};
use crate::adapters::tcp_transport::TcpTransport;
use crate::adapters::thread::spawn_reader;
use crate::adapters::time::SystemClock;
use crate::config::{SessionConfig, TransportKind};
use crate::device::registry::{Callback, DeviceKey, Registry, ReportingState};
use crate::error::{Error, ProtocolFault, Result};
use crate::protocol::codec::{self, FrameDecoder};
use crate::protocol::dispatcher::{Dispatcher, lock};
use crate::protocol::opcodes::{Opcode, ReportingControl};
use crate::protocol::report::FirmwareVersion;

const READER_THREAD: &str = "telemetrix-rx";
const READER_STACK_KB: usize = 64;

/// A connected transport, split into its two directions.
pub enum Link {
    /// Socket style: the session runs a reader thread over `source`.
    Pull {
        sink: Box<dyn CommandSink>,
        source: Box<dyn ReportSource>,
    },
    /// GATT style: the transport calls back with each notification.
    Push {
        sink: Box<dyn CommandSink>,
        notifications: Box<dyn NotificationSource>,
    },
}

enum Inbound {
    Pull(Box<dyn ReportSource>),
    Push(Box<dyn NotificationSource>),
}

enum Reader {
    Thread(JoinHandle<()>),
    Notifications(Box<dyn NotificationSource>),
}

/// State reachable from both the caller and the reader.
struct Shared {
    dispatcher: Dispatcher,
    sink: Mutex<Box<dyn CommandSink>>,
    config: SessionConfig,
    closed: AtomicBool,
}

impl Shared {
    fn send(&self, opcode: Opcode, args: &[u8]) -> Result<()> {
        let frame = codec::encode(opcode, args)?;
        debug!("tx {opcode:?} {:02x?}", frame.as_slice());
        // Write failures are absorbed here; a dead link shows up on the
        // read side instead.
        if let Err(e) = lock(&self.sink).write(&frame) {
            warn!("session: write of {opcode:?} failed: {e}");
        }
        Ok(())
    }

    /// Stop-reporting and reset sequence. Runs at most once.
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("session: shutting down");
        self.dispatcher.request_stop();

        if let Err(e) = self.send(Opcode::StopAllReports, &[]) {
            warn!("session: stop-all-reports: {e}");
        }
        self.dispatcher.registry().reporting = ReportingState::default();

        if self.config.restart_on_shutdown {
            if let Err(e) = self.send(Opcode::Reset, &[]) {
                warn!("session: reset: {e}");
            }
            thread::sleep(self.config.reset_settle());
        }
    }

    fn on_reader_fault(&self, err: Error) {
        error!("session: reader halted: {err}");
        if self.config.shutdown_on_fault {
            self.close();
        }
    }
}

pub struct Session {
    shared: Arc<Shared>,
    inbound: Mutex<Option<Inbound>>,
    reader: Mutex<Option<Reader>>,
}

impl Session {
    /// Build a session over an established link. Starts it when
    /// `config.auto_start` is set.
    pub fn new(config: SessionConfig, link: Link) -> Result<Self> {
        Self::with_clock(config, link, Box::new(SystemClock::new()))
    }

    /// [`new`](Self::new) with an explicit timestamp source.
    pub fn with_clock(config: SessionConfig, link: Link, clock: Box<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let (sink, inbound) = match link {
            Link::Pull { sink, source } => (sink, Inbound::Pull(source)),
            Link::Push {
                sink,
                notifications,
            } => (sink, Inbound::Push(notifications)),
        };
        let auto_start = config.auto_start;
        let session = Self {
            shared: Arc::new(Shared {
                dispatcher: Dispatcher::new(Registry::new(&config), clock),
                sink: Mutex::new(sink),
                config,
                closed: AtomicBool::new(false),
            }),
            inbound: Mutex::new(Some(inbound)),
            reader: Mutex::new(None),
        };

        if auto_start {
            session.start()?;
        }
        Ok(session)
    }

    /// Open the transport named by `config` and build a session on it.
    ///
    /// Only TCP can be opened from configuration alone; BLE needs a GATT
    /// client, see [`BleTransport`](crate::adapters::ble_transport::BleTransport).
    pub fn connect(config: SessionConfig) -> Result<Self> {
        match config.transport {
            TransportKind::Tcp => {
                let transport =
                    TcpTransport::connect(&config.address, config.port, config.poll_interval())?;
                let link = transport.into_link()?;
                Self::new(config, link)
            }
            TransportKind::Ble => Err(Error::Config(
                "BLE sessions are built from a GattClient via BleTransport",
            )),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Attach the reader, then perform the firmware handshake and enable
    /// reporting.
    pub fn start(&self) -> Result<FirmwareVersion> {
        let inbound = lock(&self.inbound)
            .take()
            .ok_or(Error::Config("session already started"))?;
        self.attach_reader(inbound)?;

        self.send(Opcode::GetFirmwareVersion, &[])?;
        let Some(version) = self
            .dispatcher()
            .wait_for_firmware(self.config().firmware_timeout())
        else {
            error!("session: no firmware version report, is the Telemetrix4ESP32 sketch running?");
            if self.config().shutdown_on_fault {
                self.shutdown();
            } else {
                self.abandon();
            }
            return Err(ProtocolFault::NoFirmwareVersion.into());
        };
        info!("session: Telemetrix4ESP32 firmware version {version}");

        self.send(Opcode::EnableAllReports, &[])?;
        self.dispatcher().registry().reporting.all = true;
        Ok(version)
    }

    fn attach_reader(&self, inbound: Inbound) -> Result<()> {
        let reader = match inbound {
            Inbound::Pull(mut source) => {
                let shared = Arc::clone(&self.shared);
                let handle = spawn_reader(READER_THREAD, READER_STACK_KB, move || {
                    if let Err(e) = shared.dispatcher.run(source.as_mut()) {
                        shared.on_reader_fault(e);
                    }
                })
                .map_err(|e| Error::TransportFailure(e.into()))?;
                Reader::Thread(handle)
            }
            Inbound::Push(mut notifications) => {
                let shared = Arc::clone(&self.shared);
                let mut decoder = FrameDecoder::new();
                notifications.subscribe(Box::new(move |data: &[u8]| {
                    if let Err(e) = shared.dispatcher.on_notification(&mut decoder, data) {
                        shared.on_reader_fault(e);
                    }
                }))?;
                Reader::Notifications(notifications)
            }
        };
        *lock(&self.reader) = Some(reader);
        Ok(())
    }

    /// Stop reporting, optionally reset the firmware, and release the
    /// reader. Errors along the way are logged, never returned. Safe to
    /// call more than once, and from inside a callback.
    pub fn shutdown(&self) {
        self.shared.close();
        self.release_reader();
    }

    /// Stop and release the reader without sending anything. The session
    /// counts as shut down afterwards, so dropping it stays silent too.
    fn abandon(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            warn!("session: closing without the shutdown sequence");
        }
        self.dispatcher().request_stop();
        self.release_reader();
    }

    fn release_reader(&self) {
        match lock(&self.reader).take() {
            Some(Reader::Thread(handle)) => {
                if handle.thread().id() == thread::current().id() {
                    debug!("session: shutdown from the reader, not joining");
                } else if handle.join().is_err() {
                    warn!("session: reader thread panicked");
                }
            }
            Some(Reader::Notifications(mut source)) => {
                if let Err(e) = source.unsubscribe() {
                    warn!("session: unsubscribe failed: {e}");
                }
            }
            None => {}
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// The fault that halted the reader, if any.
    pub fn fault(&self) -> Option<Error> {
        self.dispatcher().fault()
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.dispatcher().firmware_version()
    }

    pub fn reporting_enabled(&self) -> ReportingState {
        self.dispatcher().registry().reporting.clone()
    }

    // ── Plumbing for the command modules ──────────────────────

    pub(crate) fn send(&self, opcode: Opcode, args: &[u8]) -> Result<()> {
        self.shared.send(opcode, args)
    }

    /// Run `op`; on failure apply the shutdown-on-fault policy before
    /// handing the error back.
    pub(crate) fn checked<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let result = op();
        if let Err(e) = &result {
            if self.config().shutdown_on_fault {
                warn!("session: {e}, shutting down");
                self.shutdown();
            }
        }
        result
    }

    // ── Loop-back and reporting control ───────────────────────

    /// Ask the firmware to echo `value` back as a loop-back report.
    pub fn loop_back(&self, value: u8, callback: Callback) -> Result<()> {
        self.dispatcher()
            .registry()
            .register(DeviceKey::Loopback, callback);
        self.send(Opcode::Loop, &[value])
    }

    pub fn enable_all_reports(&self) -> Result<()> {
        self.send(Opcode::EnableAllReports, &[])?;
        self.dispatcher().registry().reporting.all = true;
        Ok(())
    }

    /// STOP_ALL_REPORTS: the firmware stops scanning every input.
    pub fn stop_all_reports(&self) -> Result<()> {
        self.send(Opcode::StopAllReports, &[])?;
        self.dispatcher().registry().reporting = ReportingState::default();
        Ok(())
    }

    /// Disable reporting for every digital and analog input pin.
    pub fn disable_all_reporting(&self) -> Result<()> {
        self.modify_reporting(ReportingControl::DisableAll, 0)?;
        self.dispatcher().registry().reporting = ReportingState::default();
        Ok(())
    }

    pub fn enable_digital_reporting(&self, pin: u8) -> Result<()> {
        self.modify_reporting(ReportingControl::DigitalEnable, pin)?;
        self.dispatcher().registry().reporting.digital.insert(pin);
        Ok(())
    }

    pub fn disable_digital_reporting(&self, pin: u8) -> Result<()> {
        self.modify_reporting(ReportingControl::DigitalDisable, pin)?;
        self.dispatcher().registry().reporting.digital.remove(&pin);
        Ok(())
    }

    pub fn enable_analog_reporting(&self, pin: u8) -> Result<()> {
        self.modify_reporting(ReportingControl::AnalogEnable, pin)?;
        self.dispatcher().registry().reporting.analog.insert(pin);
        Ok(())
    }

    pub fn disable_analog_reporting(&self, pin: u8) -> Result<()> {
        self.modify_reporting(ReportingControl::AnalogDisable, pin)?;
        self.dispatcher().registry().reporting.analog.remove(&pin);
        Ok(())
    }

    fn modify_reporting(&self, control: ReportingControl, pin: u8) -> Result<()> {
        self.send(Opcode::ModifyReporting, &[control as u8, pin])
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
