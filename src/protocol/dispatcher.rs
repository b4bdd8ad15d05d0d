//! Report dispatcher: the receive side of a session.
//!
//! ```text
//!   Idle ─▶ ReadingLength ─▶ ReadingPayload ─▶ Dispatching ─┐
//!               ▲                                           │
//!               └───────────────────────────────────────────┘
//!   (shutdown flag seen at the top of an iteration) ─▶ Stopped
//! ```
//!
//! One report is in flight at a time. The pull loop checks the shutdown
//! flag once per iteration; a frame already being read is always finished
//! and dispatched first. Unknown report ids, truncated payloads, unrouted
//! reports and firmware-signalled faults halt the loop and are recorded as
//! the session fault.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};

use super::codec::{self, FrameDecoder, MAX_BODY_LEN};
use super::opcodes::ReportId;
use super::report::{FirmwareVersion, Report, ReportEvent};
use crate::app::ports::{Clock, ReportSource};
use crate::device::registry::{DeviceKey, Registry};
use crate::device::stepper::StepperReport;
use crate::error::{DeviceFault, Error, ProtocolFault, Result, TransportError};

/// Reader loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    ReadingLength,
    ReadingPayload,
    Dispatching,
    Stopped,
}

/// Lock a mutex, ignoring poisoning (a panicking callback must not wedge
/// the session).
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receive-side state shared between the session API and the reader.
pub struct Dispatcher {
    registry: Mutex<Registry>,
    firmware: Mutex<Option<FirmwareVersion>>,
    firmware_ready: Condvar,
    shutdown: AtomicBool,
    fault: Mutex<Option<Error>>,
    state: Mutex<LoopState>,
    clock: Box<dyn Clock>,
}

impl Dispatcher {
    pub fn new(registry: Registry, clock: Box<dyn Clock>) -> Self {
        Self {
            registry: Mutex::new(registry),
            firmware: Mutex::new(None),
            firmware_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            fault: Mutex::new(None),
            state: Mutex::new(LoopState::Idle),
            clock,
        }
    }

    pub fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    pub fn loop_state(&self) -> LoopState {
        *lock(&self.state)
    }

    fn set_state(&self, state: LoopState) {
        *lock(&self.state) = state;
    }

    // ── Shutdown / fault flags ────────────────────────────────

    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// The fault that halted the loop, if any.
    pub fn fault(&self) -> Option<Error> {
        *lock(&self.fault)
    }

    fn halt(&self, err: Error) -> Error {
        error!("dispatcher: halting on {err}");
        {
            let mut fault = lock(&self.fault);
            if fault.is_none() {
                *fault = Some(err);
            }
        }
        self.request_stop();
        self.set_state(LoopState::Stopped);
        err
    }

    // ── Firmware handshake ────────────────────────────────────

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        *lock(&self.firmware)
    }

    /// Block until a firmware report arrives or `timeout` elapses.
    pub fn wait_for_firmware(&self, timeout: Duration) -> Option<FirmwareVersion> {
        let guard = lock(&self.firmware);
        let (guard, _) = self
            .firmware_ready
            .wait_timeout_while(guard, timeout, |v| v.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    // ── Pull path ─────────────────────────────────────────────

    /// Run the reader loop until shutdown or a fault.
    ///
    /// Returns `Ok(())` when stopped by the shutdown flag, or the fault
    /// that halted it.
    pub fn run(&self, source: &mut dyn ReportSource) -> Result<()> {
        let mut body = [0u8; MAX_BODY_LEN];
        info!("dispatcher: reader started");

        loop {
            if self.stop_requested() {
                self.set_state(LoopState::Stopped);
                info!("dispatcher: reader stopped");
                return Ok(());
            }

            self.set_state(LoopState::ReadingLength);
            let mut len = [0u8; 1];
            match source.read_exact(&mut len) {
                Ok(()) => {}
                Err(TransportError::Timeout) => continue,
                Err(e) => {
                    if self.stop_requested() {
                        // Peer closed the socket as part of our own shutdown.
                        self.set_state(LoopState::Stopped);
                        return Ok(());
                    }
                    return Err(self.halt(Error::TransportFailure(e)));
                }
            }

            let len = len[0] as usize;
            self.set_state(LoopState::ReadingPayload);
            if let Err(e) = read_body(source, &mut body[..len]) {
                return Err(self.halt(Error::TransportFailure(e)));
            }

            self.set_state(LoopState::Dispatching);
            if let Err(e) = self.handle_frame(&body[..len]) {
                return Err(self.halt(e));
            }
        }
    }

    // ── Push path ─────────────────────────────────────────────

    /// Feed one notification buffer. Once the loop has halted or shutdown
    /// was requested, further buffers are dropped.
    pub fn on_notification(&self, decoder: &mut FrameDecoder, data: &[u8]) -> Result<()> {
        if self.stop_requested() {
            debug!("dispatcher: dropping {} bytes after stop", data.len());
            return Ok(());
        }
        self.set_state(LoopState::Dispatching);
        if let Err(e) = decoder.feed(data, |body| self.handle_frame(body)) {
            return Err(self.halt(e));
        }
        self.set_state(LoopState::ReadingLength);
        Ok(())
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Decode one frame body (length byte already stripped) and route it.
    pub fn handle_frame(&self, body: &[u8]) -> Result<()> {
        let (raw_id, payload) = codec::decode(body).ok_or(ProtocolFault::EmptyFrame)?;
        let id = ReportId::try_from(raw_id)?;
        let report = Report::parse(id, payload)?;
        self.route(ReportEvent {
            report,
            timestamp: self.clock.now(),
        })
    }

    /// Deliver a decoded report to its owner.
    pub fn route(&self, event: ReportEvent) -> Result<()> {
        match &event.report {
            Report::Firmware(version) => {
                info!("dispatcher: firmware version {version}");
                *lock(&self.firmware) = Some(*version);
                self.firmware_ready.notify_all();
                Ok(())
            }
            Report::Debug { id, value } => {
                info!("DEBUG ID: {id} Value: {value}");
                Ok(())
            }
            Report::ServoUnavailable { pin } => {
                Err(DeviceFault::ServoUnavailable { pin: *pin }.into())
            }
            Report::I2cTooFewBytes { port, address } => Err(DeviceFault::I2cTooFewBytes {
                port: *port,
                address: *address,
            }
            .into()),
            Report::I2cTooManyBytes { port, address } => Err(DeviceFault::I2cTooManyBytes {
                port: *port,
                address: *address,
            }
            .into()),
            Report::StepperDistanceToGo { motor_id, .. } => {
                self.deliver_stepper(*motor_id, StepperReport::DistanceToGo, &event)
            }
            Report::StepperTargetPosition { motor_id, .. } => {
                self.deliver_stepper(*motor_id, StepperReport::TargetPosition, &event)
            }
            Report::StepperCurrentPosition { motor_id, .. } => {
                self.deliver_stepper(*motor_id, StepperReport::CurrentPosition, &event)
            }
            Report::StepperRunning { motor_id, .. } => {
                self.deliver_stepper(*motor_id, StepperReport::IsRunning, &event)
            }
            Report::StepperRunComplete { motor_id } => {
                if let Err(e) = self.registry().steppers.mark_stopped(*motor_id) {
                    warn!("dispatcher: run-complete for {e}");
                }
                self.deliver_stepper(*motor_id, StepperReport::MotionComplete, &event)
            }
            other => match device_key(other) {
                Some(key) => self.deliver(key, &event),
                None => Err(ProtocolFault::Unrouted(other.id()).into()),
            },
        }
    }

    fn deliver(&self, key: DeviceKey, event: &ReportEvent) -> Result<()> {
        // Take the callback out so it runs without the registry lock held;
        // callbacks are free to issue commands of their own.
        let mut cb = self
            .registry()
            .take(key)
            .ok_or(ProtocolFault::Unrouted(event.report.id()))?;
        cb(event);
        self.registry().restore(key, cb);
        Ok(())
    }

    fn deliver_stepper(&self, id: u8, kind: StepperReport, event: &ReportEvent) -> Result<()> {
        let mut cb = self
            .registry()
            .steppers
            .take_callback(id, kind)
            .ok_or(ProtocolFault::Unrouted(event.report.id()))?;
        cb(event);
        self.registry().steppers.restore_callback(id, kind, cb);
        Ok(())
    }
}

/// Route key for reports owned by a single registry entry. `None` for the
/// reports `route` handles itself.
fn device_key(report: &Report) -> Option<DeviceKey> {
    let key = match report {
        Report::Loopback { .. } => DeviceKey::Loopback,
        Report::Digital { pin, .. } => DeviceKey::Digital(*pin),
        Report::Analog { pin, .. } => DeviceKey::Analog(*pin),
        Report::Touch { pin, .. } => DeviceKey::Touch(*pin),
        Report::DhtData { pin, .. } | Report::DhtError { pin, .. } => DeviceKey::Dht(*pin),
        Report::SonarDistance { trigger_pin, .. } => DeviceKey::Sonar(*trigger_pin),
        Report::I2cRead { .. } => DeviceKey::I2c,
        Report::Spi { .. } => DeviceKey::Spi,
        Report::OneWire { .. } => DeviceKey::OneWire,
        Report::Firmware(_)
        | Report::Debug { .. }
        | Report::ServoUnavailable { .. }
        | Report::I2cTooFewBytes { .. }
        | Report::I2cTooManyBytes { .. }
        | Report::StepperDistanceToGo { .. }
        | Report::StepperTargetPosition { .. }
        | Report::StepperCurrentPosition { .. }
        | Report::StepperRunning { .. }
        | Report::StepperRunComplete { .. } => return None,
    };
    Some(key)
}

/// Read a frame body. Once the length byte is in, a timeout is not a frame
/// boundary any more, so keep waiting.
fn read_body(
    source: &mut dyn ReportSource,
    body: &mut [u8],
) -> core::result::Result<(), TransportError> {
    if body.is_empty() {
        return Ok(());
    }
    loop {
        match source.read_exact(body) {
            Err(TransportError::Timeout) => continue,
            other => return other,
        }
    }
}
