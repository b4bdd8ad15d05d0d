//! GPIO capability tables for the ESP32 (WROOM/DevKit) target.
//!
//! Single source of truth: every `set_pin_mode_*` call resolves its pin
//! against these sets before a single byte goes out on the wire.
//! A pin may sit in several families and may be reconfigured at will;
//! no cross-family claim tracking happens here.

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Digital I/O
// ---------------------------------------------------------------------------

/// Pins usable as digital inputs (plain, pull-up and pull-down).
pub const DIGITAL_INPUT_PINS: &[u8] = &[
    4, 5, 12, 13, 14, 16, 17, 18, 19, 21, 22, 23, 25, 26, 27, 32, 33,
];

/// Pins usable as digital outputs. GPIO 2 drives the on-board LED.
pub const DIGITAL_OUTPUT_PINS: &[u8] = &[
    2, 4, 5, 12, 13, 14, 16, 17, 18, 19, 21, 22, 23, 25, 26, 27, 32, 33,
];

// ---------------------------------------------------------------------------
// Analog / touch
// ---------------------------------------------------------------------------

/// ADC1 pins (ADC2 is unusable while WiFi is up).
pub const ANALOG_INPUT_PINS: &[u8] = &[32, 33, 34, 35, 36, 39];

/// Capacitive touch pads.
pub const TOUCH_PINS: &[u8] = &[4, 12, 13, 14, 15, 27, 32, 33];

/// The two DAC outputs.
pub const DAC_PINS: &[u8] = &[25, 26];

// ---------------------------------------------------------------------------
// Servo
// ---------------------------------------------------------------------------

/// Pins the firmware can attach a servo to.
pub const SERVO_PINS: &[u8] = DIGITAL_INPUT_PINS;

/// Default servo pulse bounds in microseconds.
pub const SERVO_MIN_PULSE_US: u16 = 544;
pub const SERVO_MAX_PULSE_US: u16 = 2400;

// ---------------------------------------------------------------------------
// Mode families
// ---------------------------------------------------------------------------

/// The capability family a pin is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinFamily {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    Touch,
    Servo,
    Dac,
}

impl PinFamily {
    pub fn pins(self) -> &'static [u8] {
        match self {
            Self::DigitalInput => DIGITAL_INPUT_PINS,
            Self::DigitalOutput => DIGITAL_OUTPUT_PINS,
            Self::AnalogInput => ANALOG_INPUT_PINS,
            Self::Touch => TOUCH_PINS,
            Self::Servo => SERVO_PINS,
            Self::Dac => DAC_PINS,
        }
    }

    /// Pure set-membership check.
    pub fn supports(self, pin: u8) -> bool {
        self.pins().contains(&pin)
    }
}

impl fmt::Display for PinFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DigitalInput => "digital input",
            Self::DigitalOutput => "digital output",
            Self::AnalogInput => "analog input",
            Self::Touch => "touch",
            Self::Servo => "servo",
            Self::Dac => "DAC output",
        };
        f.write_str(name)
    }
}
