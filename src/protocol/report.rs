//! Typed report payloads.
//!
//! Each report id has a fixed payload shape; [`Report::parse`] checks the
//! length and decodes the multi-byte fields:
//!
//! | Report            | Payload                                        |
//! |-------------------|------------------------------------------------|
//! | analog/touch/sonar| pin, value MSB, value LSB                      |
//! | digital           | pin, value                                     |
//! | DHT data          | 0, pin, humidity f32 LE, temperature f32 LE    |
//! | DHT error         | 1, pin, error code                             |
//! | I2C read          | count, address, register, data...              |
//! | SPI               | count, data...                                 |
//! | OneWire           | sub-type, data...                              |
//! | stepper position  | motor id, i32 BE                               |
//! | stepper running   | motor id, flag                                 |

use std::time::SystemTime;

use heapless::Vec;

use super::opcodes::{DHT_DATA, DHT_ERROR, ReportId};
use crate::error::ProtocolFault;

/// Variable-length report bytes (a frame body minus the report id).
pub type Payload = Vec<u8, 254>;

/// Firmware version as reported by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl core::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A decoded report.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Loopback { value: u8 },
    Digital { pin: u8, value: u8 },
    Analog { pin: u8, value: u16 },
    Firmware(FirmwareVersion),
    ServoUnavailable { pin: u8 },
    I2cTooFewBytes { port: u8, address: u8 },
    I2cTooManyBytes { port: u8, address: u8 },
    I2cRead { count: u8, address: u8, register: u8, data: Payload },
    SonarDistance { trigger_pin: u8, distance: u16 },
    DhtData { pin: u8, humidity: f32, temperature: f32 },
    DhtError { pin: u8, code: u8 },
    Touch { pin: u8, value: u16 },
    Spi { count: u8, data: Payload },
    OneWire { subtype: u8, data: Payload },
    StepperDistanceToGo { motor_id: u8, steps: i32 },
    StepperTargetPosition { motor_id: u8, position: i32 },
    StepperCurrentPosition { motor_id: u8, position: i32 },
    StepperRunning { motor_id: u8, running: bool },
    StepperRunComplete { motor_id: u8 },
    Debug { id: u8, value: u16 },
}

/// A report plus the client-side receive time. The timestamp never
/// travels over the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEvent {
    pub report: Report,
    pub timestamp: SystemTime,
}

impl Report {
    /// Decode the payload of a report with the given id.
    pub fn parse(id: ReportId, payload: &[u8]) -> Result<Self, ProtocolFault> {
        let need = |n: usize| {
            if payload.len() < n {
                Err(ProtocolFault::Truncated {
                    report: id,
                    len: payload.len(),
                })
            } else {
                Ok(())
            }
        };

        let report = match id {
            ReportId::Loopback => {
                need(1)?;
                Self::Loopback { value: payload[0] }
            }
            ReportId::Digital => {
                need(2)?;
                Self::Digital {
                    pin: payload[0],
                    value: payload[1],
                }
            }
            ReportId::Analog => {
                need(3)?;
                Self::Analog {
                    pin: payload[0],
                    value: be_u16(payload[1], payload[2]),
                }
            }
            ReportId::Firmware => {
                need(2)?;
                Self::Firmware(FirmwareVersion {
                    major: payload[0],
                    minor: payload[1],
                    patch: payload.get(2).copied().unwrap_or(0),
                })
            }
            ReportId::ServoUnavailable => {
                need(1)?;
                Self::ServoUnavailable { pin: payload[0] }
            }
            ReportId::I2cTooFewBytes => {
                need(2)?;
                Self::I2cTooFewBytes {
                    port: payload[0],
                    address: payload[1],
                }
            }
            ReportId::I2cTooManyBytes => {
                need(2)?;
                Self::I2cTooManyBytes {
                    port: payload[0],
                    address: payload[1],
                }
            }
            ReportId::I2cRead => {
                need(3)?;
                Self::I2cRead {
                    count: payload[0],
                    address: payload[1],
                    register: payload[2],
                    data: tail(&payload[3..]),
                }
            }
            ReportId::SonarDistance => {
                need(3)?;
                Self::SonarDistance {
                    trigger_pin: payload[0],
                    distance: be_u16(payload[1], payload[2]),
                }
            }
            ReportId::Dht => {
                need(3)?;
                match payload[0] {
                    DHT_ERROR => Self::DhtError {
                        pin: payload[1],
                        code: payload[2],
                    },
                    DHT_DATA => {
                        need(10)?;
                        Self::DhtData {
                            pin: payload[1],
                            humidity: le_f32(&payload[2..6]),
                            temperature: le_f32(&payload[6..10]),
                        }
                    }
                    // Firmware treats any nonzero sub-type as an error report.
                    _ => Self::DhtError {
                        pin: payload[1],
                        code: payload[2],
                    },
                }
            }
            ReportId::Touch => {
                need(3)?;
                Self::Touch {
                    pin: payload[0],
                    value: be_u16(payload[1], payload[2]),
                }
            }
            ReportId::Spi => {
                need(1)?;
                Self::Spi {
                    count: payload[0],
                    data: tail(&payload[1..]),
                }
            }
            ReportId::OneWire => {
                need(1)?;
                Self::OneWire {
                    subtype: payload[0],
                    data: tail(&payload[1..]),
                }
            }
            ReportId::StepperDistanceToGo => {
                need(5)?;
                Self::StepperDistanceToGo {
                    motor_id: payload[0],
                    steps: be_i32(&payload[1..5]),
                }
            }
            ReportId::StepperTargetPosition => {
                need(5)?;
                Self::StepperTargetPosition {
                    motor_id: payload[0],
                    position: be_i32(&payload[1..5]),
                }
            }
            ReportId::StepperCurrentPosition => {
                need(5)?;
                Self::StepperCurrentPosition {
                    motor_id: payload[0],
                    position: be_i32(&payload[1..5]),
                }
            }
            ReportId::StepperRunning => {
                need(2)?;
                Self::StepperRunning {
                    motor_id: payload[0],
                    running: payload[1] != 0,
                }
            }
            ReportId::StepperRunComplete => {
                need(1)?;
                Self::StepperRunComplete {
                    motor_id: payload[0],
                }
            }
            ReportId::DebugPrint => {
                need(3)?;
                Self::Debug {
                    id: payload[0],
                    value: be_u16(payload[1], payload[2]),
                }
            }
        };

        Ok(report)
    }

    pub fn id(&self) -> ReportId {
        match self {
            Self::Loopback { .. } => ReportId::Loopback,
            Self::Digital { .. } => ReportId::Digital,
            Self::Analog { .. } => ReportId::Analog,
            Self::Firmware(_) => ReportId::Firmware,
            Self::ServoUnavailable { .. } => ReportId::ServoUnavailable,
            Self::I2cTooFewBytes { .. } => ReportId::I2cTooFewBytes,
            Self::I2cTooManyBytes { .. } => ReportId::I2cTooManyBytes,
            Self::I2cRead { .. } => ReportId::I2cRead,
            Self::SonarDistance { .. } => ReportId::SonarDistance,
            Self::DhtData { .. } | Self::DhtError { .. } => ReportId::Dht,
            Self::Touch { .. } => ReportId::Touch,
            Self::Spi { .. } => ReportId::Spi,
            Self::OneWire { .. } => ReportId::OneWire,
            Self::StepperDistanceToGo { .. } => ReportId::StepperDistanceToGo,
            Self::StepperTargetPosition { .. } => ReportId::StepperTargetPosition,
            Self::StepperCurrentPosition { .. } => ReportId::StepperCurrentPosition,
            Self::StepperRunning { .. } => ReportId::StepperRunning,
            Self::StepperRunComplete { .. } => ReportId::StepperRunComplete,
            Self::Debug { .. } => ReportId::DebugPrint,
        }
    }
}

fn be_u16(msb: u8, lsb: u8) -> u16 {
    u16::from_be_bytes([msb, lsb])
}

fn be_i32(bytes: &[u8]) -> i32 {
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn tail(bytes: &[u8]) -> Payload {
    // A frame body is at most 255 bytes, so the tail always fits.
    Payload::from_slice(&bytes[..bytes.len().min(254)]).unwrap_or_default()
}
