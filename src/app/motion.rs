//! Stepper commands.
//!
//! The firmware proxies AccelStepper; motor ids are handed out in order
//! from the [`StepperPool`](crate::device::stepper::StepperPool). Every
//! check (slot assigned, value in range) runs before a byte is written.

use log::info;

use super::session::Session;
use crate::device::registry::{Callback, Registry};
use crate::device::stepper::{
    MotorInterface, StepperPhase, StepperReport, encode_current_position, encode_position,
};
use crate::error::Result;
use crate::pins::PinFamily;
use crate::protocol::opcodes::Opcode;

/// Enable-pin value meaning "no enable pin".
pub const NO_ENABLE_PIN: u8 = 0xFF;

impl Session {
    /// Create a stepper instance and return its motor id.
    ///
    /// `interface` is the AccelStepper interface code (1, 2, 3, 4, 6, 8);
    /// only the first `pin_count` entries of `pins` are used and checked.
    pub fn set_pin_mode_stepper(&self, interface: u8, pins: [u8; 4], enable: bool) -> Result<u8> {
        self.checked(|| {
            let interface = MotorInterface::try_from(interface)?;
            for &pin in &pins[..interface.pin_count()] {
                Registry::require_pin(pin, PinFamily::DigitalOutput)?;
            }
            let id = self.dispatcher().registry().steppers.assign()?;
            info!("motion: stepper {id} on {:?} ({interface:?})", &pins[..interface.pin_count()]);
            let [p1, p2, p3, p4] = pins;
            self.send(
                Opcode::SetPinModeStepper,
                &[id, interface as u8, p1, p2, p3, p4, u8::from(enable)],
            )?;
            Ok(id)
        })
    }

    /// Absolute target position.
    pub fn stepper_move_to(&self, motor_id: u8, position: i32) -> Result<()> {
        self.stepper_position(Opcode::StepperMoveTo, motor_id, position)
    }

    /// Target relative to the current position.
    pub fn stepper_move(&self, motor_id: u8, relative: i32) -> Result<()> {
        self.stepper_position(Opcode::StepperMove, motor_id, relative)
    }

    fn stepper_position(&self, opcode: Opcode, motor_id: u8, position: i32) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().steppers.require(motor_id)?;
            let [b0, b1, b2, b3, polarity] = encode_position(position)?;
            self.send(opcode, &[motor_id, b0, b1, b2, b3, polarity])
        })
    }

    /// Run to the target with acceleration; `on_complete` fires with the
    /// run-complete report.
    pub fn stepper_run(&self, motor_id: u8, on_complete: Callback) -> Result<()> {
        self.stepper_start(Opcode::StepperRun, motor_id, Some(on_complete))
    }

    /// Run at constant speed with no target.
    pub fn stepper_run_speed(&self, motor_id: u8) -> Result<()> {
        self.stepper_start(Opcode::StepperRunSpeed, motor_id, None)
    }

    /// Run at constant speed until the target is reached.
    pub fn stepper_run_speed_to_position(&self, motor_id: u8, on_complete: Callback) -> Result<()> {
        self.stepper_start(Opcode::StepperRunSpeedToPosition, motor_id, Some(on_complete))
    }

    fn stepper_start(&self, opcode: Opcode, motor_id: u8, on_complete: Option<Callback>) -> Result<()> {
        self.checked(|| {
            {
                let mut registry = self.dispatcher().registry();
                if let Some(cb) = on_complete {
                    registry
                        .steppers
                        .set_callback(motor_id, StepperReport::MotionComplete, cb)?;
                }
                registry.steppers.mark_running(motor_id)?;
            }
            self.send(opcode, &[motor_id])
        })
    }

    pub fn stepper_stop(&self, motor_id: u8) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().steppers.mark_stopped(motor_id)?;
            self.send(Opcode::StepperStop, &[motor_id])
        })
    }

    // ── Speed / acceleration (kept locally, never echoed) ─────

    pub fn stepper_set_max_speed(&self, motor_id: u8, max_speed: u16) -> Result<()> {
        self.checked(|| {
            self.dispatcher()
                .registry()
                .steppers
                .set_max_speed(motor_id, max_speed)?;
            self.send_u16(Opcode::StepperSetMaxSpeed, motor_id, max_speed)
        })
    }

    pub fn stepper_get_max_speed(&self, motor_id: u8) -> Result<u16> {
        self.checked(|| self.dispatcher().registry().steppers.max_speed(motor_id))
    }

    pub fn stepper_set_acceleration(&self, motor_id: u8, acceleration: u16) -> Result<()> {
        self.checked(|| {
            self.dispatcher()
                .registry()
                .steppers
                .set_acceleration(motor_id, acceleration)?;
            self.send_u16(Opcode::StepperSetAcceleration, motor_id, acceleration)
        })
    }

    pub fn stepper_get_acceleration(&self, motor_id: u8) -> Result<u16> {
        self.checked(|| self.dispatcher().registry().steppers.acceleration(motor_id))
    }

    pub fn stepper_set_speed(&self, motor_id: u8, speed: u16) -> Result<()> {
        self.checked(|| {
            self.dispatcher()
                .registry()
                .steppers
                .set_speed(motor_id, speed)?;
            self.send_u16(Opcode::StepperSetSpeed, motor_id, speed)
        })
    }

    pub fn stepper_get_speed(&self, motor_id: u8) -> Result<u16> {
        self.checked(|| self.dispatcher().registry().steppers.speed(motor_id))
    }

    /// Local view of the motor's lifecycle.
    pub fn stepper_phase(&self, motor_id: u8) -> Result<StepperPhase> {
        self.checked(|| self.dispatcher().registry().steppers.phase(motor_id))
    }

    // ── Queries (answered by reports) ─────────────────────────

    pub fn stepper_get_distance_to_go(&self, motor_id: u8, callback: Callback) -> Result<()> {
        self.stepper_query(
            Opcode::StepperGetDistanceToGo,
            StepperReport::DistanceToGo,
            motor_id,
            callback,
        )
    }

    pub fn stepper_get_target_position(&self, motor_id: u8, callback: Callback) -> Result<()> {
        self.stepper_query(
            Opcode::StepperGetTargetPosition,
            StepperReport::TargetPosition,
            motor_id,
            callback,
        )
    }

    pub fn stepper_get_current_position(&self, motor_id: u8, callback: Callback) -> Result<()> {
        self.stepper_query(
            Opcode::StepperGetCurrentPosition,
            StepperReport::CurrentPosition,
            motor_id,
            callback,
        )
    }

    /// Running state always needs a round trip; the local phase is only a
    /// best guess.
    pub fn stepper_is_running(&self, motor_id: u8, callback: Callback) -> Result<()> {
        self.stepper_query(
            Opcode::StepperIsRunning,
            StepperReport::IsRunning,
            motor_id,
            callback,
        )
    }

    fn stepper_query(
        &self,
        opcode: Opcode,
        kind: StepperReport,
        motor_id: u8,
        callback: Callback,
    ) -> Result<()> {
        self.checked(|| {
            self.dispatcher()
                .registry()
                .steppers
                .set_callback(motor_id, kind, callback)?;
            self.send(opcode, &[motor_id])
        })
    }

    // ── Configuration pass-through ────────────────────────────

    /// Overwrite the current position; the firmware also zeroes speed.
    pub fn stepper_set_current_position(&self, motor_id: u8, position: i32) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().steppers.require(motor_id)?;
            let [b0, b1, b2, b3] = encode_current_position(position);
            self.send(Opcode::StepperSetCurrentPosition, &[motor_id, b0, b1, b2, b3])
        })
    }

    pub fn stepper_disable_outputs(&self, motor_id: u8) -> Result<()> {
        self.stepper_simple(Opcode::StepperDisableOutputs, motor_id, &[])
    }

    pub fn stepper_enable_outputs(&self, motor_id: u8) -> Result<()> {
        self.stepper_simple(Opcode::StepperEnableOutputs, motor_id, &[])
    }

    /// Minimum step pulse width in microseconds.
    pub fn stepper_set_min_pulse_width(&self, motor_id: u8, width_us: u16) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().steppers.require(motor_id)?;
            self.send_u16(Opcode::StepperSetMinimumPulseWidth, motor_id, width_us)
        })
    }

    /// Pin driving the driver's enable input, or [`NO_ENABLE_PIN`].
    pub fn stepper_set_enable_pin(&self, motor_id: u8, pin: u8) -> Result<()> {
        if pin != NO_ENABLE_PIN {
            self.checked(|| Registry::require_pin(pin, PinFamily::DigitalOutput))?;
        }
        self.stepper_simple(Opcode::StepperSetEnablePin, motor_id, &[pin])
    }

    pub fn stepper_set_3_pins_inverted(
        &self,
        motor_id: u8,
        direction: bool,
        step: bool,
        enable: bool,
    ) -> Result<()> {
        self.stepper_simple(
            Opcode::StepperSet3PinsInverted,
            motor_id,
            &[u8::from(direction), u8::from(step), u8::from(enable)],
        )
    }

    pub fn stepper_set_4_pins_inverted(
        &self,
        motor_id: u8,
        pins: [bool; 4],
        enable: bool,
    ) -> Result<()> {
        let [p1, p2, p3, p4] = pins.map(u8::from);
        self.stepper_simple(
            Opcode::StepperSet4PinsInverted,
            motor_id,
            &[p1, p2, p3, p4, u8::from(enable)],
        )
    }

    fn stepper_simple(&self, opcode: Opcode, motor_id: u8, rest: &[u8]) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().steppers.require(motor_id)?;
            let mut args = heapless::Vec::<u8, 8>::new();
            // motor id plus at most five flags
            let _ = args.push(motor_id);
            let _ = args.extend_from_slice(rest);
            self.send(opcode, &args)
        })
    }

    fn send_u16(&self, opcode: Opcode, motor_id: u8, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.send(opcode, &[motor_id, hi, lo])
    }
}
