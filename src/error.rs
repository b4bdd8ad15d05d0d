//! Unified error types for the Telemetrix client.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! session API and the report loop share one fault vocabulary.
//! All variants are `Copy`: a fault recorded by the reader thread can be
//! handed back to any caller without allocation or locking games.

use core::fmt;

use crate::pins::PinFamily;
use crate::protocol::opcodes::ReportId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the driver funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pin is not in the capability table for the requested mode.
    InvalidPin { pin: u8, family: PinFamily },
    /// An argument is outside its documented numeric bounds.
    InvalidRange { field: &'static str, value: i64 },
    /// A mode that reports data was configured without a callback.
    MissingCallback(&'static str),
    /// A fixed-size pool or counter ceiling has been reached.
    ResourceExhausted(Resource),
    /// The peer spoke something outside the agreed protocol.
    ProtocolMismatch(ProtocolFault),
    /// The underlying link failed.
    TransportFailure(TransportError),
    /// The peripheral was used before its init command was sent.
    NotEnabled(Peripheral),
    /// The firmware (or the bus behind it) signalled a failure.
    DeviceFault(DeviceFault),
    /// Configuration is invalid for the requested operation.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin { pin, family } => {
                write!(f, "invalid pin: GPIO {pin} does not support {family}")
            }
            Self::InvalidRange { field, value } => {
                write!(f, "invalid range: {field} = {value}")
            }
            Self::MissingCallback(op) => write!(f, "{op}: a callback must be specified"),
            Self::ResourceExhausted(r) => write!(f, "resource exhausted: {r}"),
            Self::ProtocolMismatch(e) => write!(f, "protocol mismatch: {e}"),
            Self::TransportFailure(e) => write!(f, "transport: {e}"),
            Self::NotEnabled(p) => write!(f, "not enabled: {p}"),
            Self::DeviceFault(e) => write!(f, "device: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Capacity ceilings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Steppers,
    Sonars,
    Dhts,
    OneWireDevices,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steppers => write!(f, "maximum number of steppers already assigned"),
            Self::Sonars => write!(f, "maximum number of sonars exceeded"),
            Self::Dhts => write!(f, "maximum number of DHTs exceeded"),
            Self::OneWireDevices => write!(f, "too many OneWire devices on the bus"),
        }
    }
}

impl From<Resource> for Error {
    fn from(r: Resource) -> Self {
        Self::ResourceExhausted(r)
    }
}

// ---------------------------------------------------------------------------
// Protocol faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFault {
    /// No firmware version report arrived during the handshake.
    NoFirmwareVersion,
    /// A report id outside the closed report enumeration.
    UnknownReport(u8),
    /// A frame whose length byte is zero (no report id).
    EmptyFrame,
    /// A report payload shorter than its fixed shape.
    Truncated { report: ReportId, len: usize },
    /// A report arrived for a device key nobody registered.
    Unrouted(ReportId),
    /// A reply the caller is waiting on never arrived.
    ReplyTimeout(ReportId),
    /// A command does not fit in a single length-prefixed frame.
    FrameOverflow(usize),
}

impl fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFirmwareVersion => write!(f, "could not retrieve server firmware version"),
            Self::UnknownReport(id) => write!(f, "unknown report id {id}"),
            Self::EmptyFrame => write!(f, "empty frame"),
            Self::Truncated { report, len } => {
                write!(f, "{report:?} payload truncated ({len} bytes)")
            }
            Self::Unrouted(report) => write!(f, "no callback registered for {report:?}"),
            Self::ReplyTimeout(report) => write!(f, "timed out waiting for {report:?}"),
            Self::FrameOverflow(len) => write!(f, "command of {len} bytes exceeds one frame"),
        }
    }
}

impl From<ProtocolFault> for Error {
    fn from(e: ProtocolFault) -> Self {
        Self::ProtocolMismatch(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The link is not (or no longer) connected.
    NotConnected,
    /// The peer closed the connection.
    Closed,
    /// No byte arrived within the read timeout (frame boundary only).
    Timeout,
    /// Any other socket or GATT I/O failure.
    Io(std::io::ErrorKind),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Closed => write!(f, "connection closed by peer"),
            Self::Timeout => write!(f, "read timed out"),
            Self::Io(kind) => write!(f, "I/O error: {kind}"),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Self::Timeout,
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => Self::Closed,
            std::io::ErrorKind::NotConnected => Self::NotConnected,
            kind => Self::Io(kind),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::TransportFailure(e)
    }
}

// ---------------------------------------------------------------------------
// Peripherals that need an init command first
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peripheral {
    I2c,
    Spi,
    SpiChipSelect(u8),
    OneWire,
    Stepper(u8),
}

impl fmt::Display for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2c => write!(f, "set_pin_mode_i2c never called"),
            Self::Spi => write!(f, "SPI interface is not enabled"),
            Self::SpiChipSelect(pin) => write!(f, "chip select pin {pin} never enabled"),
            Self::OneWire => write!(f, "OneWire interface is not enabled"),
            Self::Stepper(id) => write!(f, "invalid motor id {id}"),
        }
    }
}

impl From<Peripheral> for Error {
    fn from(p: Peripheral) -> Self {
        Self::NotEnabled(p)
    }
}

// ---------------------------------------------------------------------------
// Device-side faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    /// Servo attach failed on the firmware: no free servo channel.
    ServoUnavailable { pin: u8 },
    /// I2C read returned fewer bytes than requested.
    I2cTooFewBytes { port: u8, address: u8 },
    /// I2C read returned more bytes than requested.
    I2cTooManyBytes { port: u8, address: u8 },
    /// OneWire CRC-8 did not match the transmitted check byte.
    CrcMismatch { expected: u8, computed: u8 },
    /// OneWire reset saw no presence pulse.
    NoPresencePulse,
    /// OneWire device family this driver cannot decode.
    UnsupportedSensor { family: u8 },
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServoUnavailable { pin } => {
                write!(f, "servo attach for pin {pin} failed: no available servos")
            }
            Self::I2cTooFewBytes { port, address } => write!(
                f,
                "i2c too few bytes received from port {port} address {address:#04x}"
            ),
            Self::I2cTooManyBytes { port, address } => write!(
                f,
                "i2c too many bytes received from port {port} address {address:#04x}"
            ),
            Self::CrcMismatch { expected, computed } => write!(
                f,
                "OneWire CRC invalid (expected {expected:#04x}, computed {computed:#04x})"
            ),
            Self::NoPresencePulse => write!(f, "no OneWire presence pulse"),
            Self::UnsupportedSensor { family } => {
                write!(f, "unsupported OneWire family {family:#04x}")
            }
        }
    }
}

impl From<DeviceFault> for Error {
    fn from(e: DeviceFault) -> Self {
        Self::DeviceFault(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
