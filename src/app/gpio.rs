//! Pin-level commands: digital and analog I/O, PWM, DAC, touch, servo,
//! sonar and DHT.
//!
//! Every `set_pin_mode_*` resolves its pin against the capability tables
//! in [`crate::pins`] first; a rejected pin never produces a write.

use log::debug;

use super::session::Session;
use crate::device::registry::{Callback, DeviceKey, Registry};
use crate::error::{Error, Result};
use crate::pins::PinFamily;
use crate::protocol::opcodes::{Opcode, PinMode};

/// LEDC hardware channels.
pub const PWM_CHANNELS: u8 = 16;
/// Exclusive PWM frequency bounds in Hz.
pub const PWM_FREQUENCY_HZ: (f64, f64) = (10.0, 300_000.0);
/// Exclusive PWM resolution bounds in bits.
pub const PWM_RESOLUTION_BITS: (u8, u8) = (1, 16);
pub const SERVO_MAX_ANGLE: u8 = 180;

const REPORT_ENABLE: u8 = 1;

impl Session {
    /// Generic pin-mode setter behind the typed helpers.
    ///
    /// Handles the input, output, analog-input and touch modes. Every mode
    /// except [`PinMode::Output`] needs a callback. `differential` is the
    /// minimum change that triggers an analog/touch report and is ignored
    /// for digital modes.
    pub fn set_pin_mode(
        &self,
        pin: u8,
        mode: PinMode,
        differential: u16,
        callback: Option<Callback>,
    ) -> Result<()> {
        self.checked(|| {
            let (family, key) = match mode {
                PinMode::Input | PinMode::InputPullup | PinMode::InputPullDown => {
                    (PinFamily::DigitalInput, Some(DeviceKey::Digital(pin)))
                }
                PinMode::Output => (PinFamily::DigitalOutput, None),
                PinMode::Analog => (PinFamily::AnalogInput, Some(DeviceKey::Analog(pin))),
                PinMode::Touch => (PinFamily::Touch, Some(DeviceKey::Touch(pin))),
                other => {
                    return Err(Error::InvalidRange {
                        field: "pin mode",
                        value: i64::from(other as u8),
                    });
                }
            };

            let callback = match (key, callback) {
                (Some(_), None) => return Err(Error::MissingCallback("set_pin_mode")),
                (_, cb) => cb,
            };
            Registry::require_pin(pin, family)?;

            if let (Some(key), Some(cb)) = (key, callback) {
                let mut registry = self.dispatcher().registry();
                registry.register(key, cb);
                match key {
                    DeviceKey::Analog(p) => {
                        registry.reporting.analog.insert(p);
                    }
                    DeviceKey::Digital(p) => {
                        registry.reporting.digital.insert(p);
                    }
                    _ => {}
                }
            }

            let [diff_hi, diff_lo] = differential.to_be_bytes();
            match mode {
                PinMode::Output => self.send(Opcode::SetPinMode, &[pin, mode as u8]),
                PinMode::Analog | PinMode::Touch => self.send(
                    Opcode::SetPinMode,
                    &[pin, mode as u8, diff_hi, diff_lo, REPORT_ENABLE],
                ),
                _ => self.send(Opcode::SetPinMode, &[pin, mode as u8, REPORT_ENABLE]),
            }
        })
    }

    pub fn set_pin_mode_digital_input(&self, pin: u8, callback: Callback) -> Result<()> {
        self.set_pin_mode(pin, PinMode::Input, 0, Some(callback))
    }

    pub fn set_pin_mode_digital_input_pullup(&self, pin: u8, callback: Callback) -> Result<()> {
        self.set_pin_mode(pin, PinMode::InputPullup, 0, Some(callback))
    }

    pub fn set_pin_mode_digital_input_pulldown(&self, pin: u8, callback: Callback) -> Result<()> {
        self.set_pin_mode(pin, PinMode::InputPullDown, 0, Some(callback))
    }

    pub fn set_pin_mode_digital_output(&self, pin: u8) -> Result<()> {
        self.set_pin_mode(pin, PinMode::Output, 0, None)
    }

    pub fn set_pin_mode_analog_input(
        &self,
        pin: u8,
        differential: u16,
        callback: Callback,
    ) -> Result<()> {
        self.set_pin_mode(pin, PinMode::Analog, differential, Some(callback))
    }

    pub fn set_pin_mode_touch(&self, pin: u8, differential: u16, callback: Callback) -> Result<()> {
        self.set_pin_mode(pin, PinMode::Touch, differential, Some(callback))
    }

    pub fn digital_write(&self, pin: u8, value: bool) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::DigitalOutput)?;
            self.send(Opcode::DigitalWrite, &[pin, u8::from(value)])
        })
    }

    // ── PWM ───────────────────────────────────────────────────

    /// Configure an LEDC channel and attach `pin` to it. The firmware
    /// takes the frequency as a raw host-order `f64`.
    pub fn set_pin_mode_analog_output(
        &self,
        pin: u8,
        channel: u8,
        frequency: f64,
        resolution: u8,
    ) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::DigitalOutput)?;
            check_channel(channel)?;
            let (f_lo, f_hi) = PWM_FREQUENCY_HZ;
            if !(frequency > f_lo && frequency < f_hi) {
                return Err(Error::InvalidRange {
                    field: "PWM frequency",
                    value: frequency as i64,
                });
            }
            let (r_lo, r_hi) = PWM_RESOLUTION_BITS;
            if !(resolution > r_lo && resolution < r_hi) {
                return Err(Error::InvalidRange {
                    field: "PWM resolution",
                    value: i64::from(resolution),
                });
            }

            let mut args = [0u8; 12];
            args[..4].copy_from_slice(&[pin, PinMode::PwmOut as u8, channel, resolution]);
            args[4..].copy_from_slice(&frequency.to_ne_bytes());
            self.send(Opcode::SetPinMode, &args)
        })
    }

    pub fn attach_pin_to_analog_channel(&self, pin: u8, channel: u8) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::DigitalOutput)?;
            check_channel(channel)?;
            self.send(Opcode::AnalogOutAttach, &[pin, channel])
        })
    }

    pub fn detach_pin_from_analog_channel(&self, pin: u8, channel: u8) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::DigitalOutput)?;
            check_channel(channel)?;
            self.send(Opcode::AnalogOutDetach, &[pin, channel])
        })
    }

    /// Duty cycle for a configured PWM channel.
    pub fn analog_write(&self, channel: u8, value: u16) -> Result<()> {
        self.checked(|| {
            check_channel(channel)?;
            let [hi, lo] = value.to_be_bytes();
            self.send(Opcode::AnalogWrite, &[channel, hi, lo])
        })
    }

    // ── DAC ───────────────────────────────────────────────────

    pub fn set_pin_mode_dac(&self, pin: u8, value: u8) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::Dac)?;
            self.send(Opcode::DacWrite, &[pin, value])
        })
    }

    pub fn dac_disable(&self, pin: u8) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::Dac)?;
            self.send(Opcode::DacDisable, &[pin])
        })
    }

    /// Milliseconds between analog scans.
    pub fn set_analog_scan_interval(&self, interval_ms: u8) -> Result<()> {
        self.send(Opcode::SetAnalogScanningInterval, &[interval_ms])
    }

    // ── Servo ─────────────────────────────────────────────────

    /// Attach a servo with pulse bounds in microseconds. A firmware with no
    /// free servo slot answers with a servo-unavailable fault.
    pub fn set_pin_mode_servo(&self, pin: u8, min_pulse: u16, max_pulse: u16) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::Servo)?;
            if min_pulse >= max_pulse {
                return Err(Error::InvalidRange {
                    field: "servo pulse bounds",
                    value: i64::from(min_pulse),
                });
            }
            let [min_hi, min_lo] = min_pulse.to_be_bytes();
            let [max_hi, max_lo] = max_pulse.to_be_bytes();
            self.send(
                Opcode::ServoAttach,
                &[pin, min_hi, min_lo, max_hi, max_lo],
            )
        })
    }

    pub fn servo_write(&self, pin: u8, angle: u8) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::Servo)?;
            if angle > SERVO_MAX_ANGLE {
                return Err(Error::InvalidRange {
                    field: "servo angle",
                    value: i64::from(angle),
                });
            }
            self.send(Opcode::ServoWrite, &[pin, angle])
        })
    }

    pub fn servo_detach(&self, pin: u8) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::Servo)?;
            self.send(Opcode::ServoDetach, &[pin])
        })
    }

    // ── Sonar / DHT ───────────────────────────────────────────

    /// HC-SR04 style sonar. Reports are keyed by `trigger_pin`.
    pub fn set_pin_mode_sonar(&self, trigger_pin: u8, echo_pin: u8, callback: Callback) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(trigger_pin, PinFamily::DigitalInput)?;
            Registry::require_pin(echo_pin, PinFamily::DigitalInput)?;
            self.dispatcher()
                .registry()
                .register_sonar(trigger_pin, callback)?;
            debug!("gpio: sonar trigger {trigger_pin} echo {echo_pin}");
            self.send(Opcode::SonarNew, &[trigger_pin, echo_pin])
        })
    }

    pub fn set_pin_mode_dht(&self, pin: u8, callback: Callback) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::DigitalInput)?;
            self.dispatcher().registry().register_dht(pin, callback)?;
            self.send(Opcode::DhtNew, &[pin])
        })
    }
}

fn check_channel(channel: u8) -> Result<()> {
    if channel < PWM_CHANNELS {
        Ok(())
    } else {
        Err(Error::InvalidRange {
            field: "PWM channel",
            value: i64::from(channel),
        })
    }
}
