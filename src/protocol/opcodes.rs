//! Opcode and report-id enumerations.
//!
//! Commands and reports share one numeric space: a report that answers a
//! command reuses the command's number (DIGITAL_WRITE=2 / DIGITAL report=2,
//! GET_FIRMWARE_VERSION=5 / FIRMWARE report=5). Report-only ids fill the
//! gaps from 7 upward.

use crate::error::ProtocolFault;

// ───────────────────────────────────────────────────────────────
// Commands (client → firmware)
// ───────────────────────────────────────────────────────────────

/// One-byte command discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Loop = 0,
    SetPinMode = 1,
    DigitalWrite = 2,
    AnalogWrite = 3,
    ModifyReporting = 4,
    GetFirmwareVersion = 5,
    ServoAttach = 6,
    ServoWrite = 7,
    ServoDetach = 8,
    I2cBegin = 9,
    I2cRead = 10,
    I2cWrite = 11,
    SonarNew = 12,
    DhtNew = 13,
    StopAllReports = 14,
    SetAnalogScanningInterval = 15,
    EnableAllReports = 16,
    AnalogOutAttach = 17,
    AnalogOutDetach = 18,
    DacWrite = 19,
    Reset = 20,
    DacDisable = 21,
    SpiInit = 22,
    SpiWriteBlocking = 23,
    SpiReadBlocking = 24,
    SpiSetFormat = 25,
    SpiCsControl = 26,
    OneWireInit = 27,
    OneWireReset = 28,
    OneWireSelect = 29,
    OneWireSkip = 30,
    OneWireWrite = 31,
    OneWireRead = 32,
    OneWireResetSearch = 33,
    OneWireSearch = 34,
    OneWireCrc8 = 35,
    SetPinModeStepper = 36,
    StepperMoveTo = 37,
    StepperMove = 38,
    StepperRun = 39,
    StepperRunSpeed = 40,
    StepperSetMaxSpeed = 41,
    StepperSetAcceleration = 42,
    StepperSetSpeed = 43,
    StepperSetCurrentPosition = 44,
    StepperRunSpeedToPosition = 45,
    StepperStop = 46,
    StepperDisableOutputs = 47,
    StepperEnableOutputs = 48,
    StepperSetMinimumPulseWidth = 49,
    StepperSetEnablePin = 50,
    StepperSet3PinsInverted = 51,
    StepperSet4PinsInverted = 52,
    StepperIsRunning = 53,
    StepperGetCurrentPosition = 54,
    StepperGetDistanceToGo = 55,
    StepperGetTargetPosition = 56,
}

impl Opcode {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

// ───────────────────────────────────────────────────────────────
// Reports (firmware → client)
// ───────────────────────────────────────────────────────────────

/// Closed set of report ids. Anything else on the wire is a protocol fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReportId {
    Loopback = 0,
    Digital = 2,
    Analog = 3,
    Firmware = 5,
    ServoUnavailable = 6,
    I2cTooFewBytes = 7,
    I2cTooManyBytes = 8,
    I2cRead = 9,
    SonarDistance = 10,
    Dht = 11,
    Touch = 12,
    Spi = 13,
    OneWire = 14,
    StepperDistanceToGo = 15,
    StepperTargetPosition = 16,
    StepperCurrentPosition = 17,
    StepperRunning = 18,
    StepperRunComplete = 19,
    DebugPrint = 99,
}

impl TryFrom<u8> for ReportId {
    type Error = ProtocolFault;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => Self::Loopback,
            2 => Self::Digital,
            3 => Self::Analog,
            5 => Self::Firmware,
            6 => Self::ServoUnavailable,
            7 => Self::I2cTooFewBytes,
            8 => Self::I2cTooManyBytes,
            9 => Self::I2cRead,
            10 => Self::SonarDistance,
            11 => Self::Dht,
            12 => Self::Touch,
            13 => Self::Spi,
            14 => Self::OneWire,
            15 => Self::StepperDistanceToGo,
            16 => Self::StepperTargetPosition,
            17 => Self::StepperCurrentPosition,
            18 => Self::StepperRunning,
            19 => Self::StepperRunComplete,
            99 => Self::DebugPrint,
            other => return Err(ProtocolFault::UnknownReport(other)),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Pin modes carried inside SET_PIN_MODE
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PinMode {
    Input = 0,
    Output = 1,
    InputPullup = 2,
    Analog = 3,
    Servo = 4,
    Sonar = 5,
    Dht = 6,
    Touch = 7,
    PwmOut = 8,
    InputPullDown = 9,
    NotSet = 255,
}

// ───────────────────────────────────────────────────────────────
// MODIFY_REPORTING sub-commands
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReportingControl {
    DisableAll = 0,
    AnalogEnable = 1,
    DigitalEnable = 2,
    AnalogDisable = 3,
    DigitalDisable = 4,
}

/// DHT report sub-types (first payload byte).
pub const DHT_DATA: u8 = 0;
pub const DHT_ERROR: u8 = 1;
