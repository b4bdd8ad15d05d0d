//! Stepper slot pool.
//!
//! The firmware runs an AccelStepper instance per motor id; this side only
//! keeps what the firmware never echoes back (speeds, acceleration) plus the
//! per-motor report callbacks.
//!
//! ```text
//!   Unassigned ──set_pin_mode_stepper──▶ Assigned ──speed/accel──▶ Configured
//!        ▲                                  │                          │
//!        │                                  └────run / run_speed───────┤
//!   (never: slots are not released)                                    ▼
//!                              Stopped ◀──stop / run-complete──── Running
//! ```

use crate::device::registry::Callback;
use crate::error::{Error, Peripheral, Resource, Result};

/// Inclusive bounds for speed, max speed and acceleration.
pub const MOTION_RANGE: core::ops::RangeInclusive<u16> = 1..=1000;

/// AccelStepper motor interface types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MotorInterface {
    /// Step/direction driver board, 2 pins.
    Driver = 1,
    Full2Wire = 2,
    Full3Wire = 3,
    Full4Wire = 4,
    Half3Wire = 6,
    Half4Wire = 8,
}

impl MotorInterface {
    /// How many of the four pin arguments the interface drives.
    pub fn pin_count(self) -> usize {
        match self {
            Self::Driver | Self::Full2Wire => 2,
            Self::Full3Wire | Self::Half3Wire => 3,
            Self::Full4Wire | Self::Half4Wire => 4,
        }
    }
}

impl TryFrom<u8> for MotorInterface {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        Ok(match raw {
            1 => Self::Driver,
            2 => Self::Full2Wire,
            3 => Self::Full3Wire,
            4 => Self::Full4Wire,
            6 => Self::Half3Wire,
            8 => Self::Half4Wire,
            other => {
                return Err(Error::InvalidRange {
                    field: "stepper interface",
                    value: i64::from(other),
                });
            }
        })
    }
}

/// Local lifecycle of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepperPhase {
    #[default]
    Unassigned,
    Assigned,
    Configured,
    Running,
    Stopped,
}

/// The five per-motor report kinds a callback can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepperReport {
    DistanceToGo,
    TargetPosition,
    CurrentPosition,
    IsRunning,
    MotionComplete,
}

impl StepperReport {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }
}

/// One independently initialised slot.
#[derive(Default)]
pub struct StepperState {
    pub instance_created: bool,
    pub phase: StepperPhase,
    pub max_speed: u16,
    pub speed: u16,
    pub acceleration: u16,
    callbacks: [Option<Callback>; StepperReport::COUNT],
}

impl core::fmt::Debug for StepperState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StepperState")
            .field("instance_created", &self.instance_created)
            .field("phase", &self.phase)
            .field("max_speed", &self.max_speed)
            .field("speed", &self.speed)
            .field("acceleration", &self.acceleration)
            .finish_non_exhaustive()
    }
}

/// Fixed pool of stepper slots indexed by motor id.
pub struct StepperPool {
    slots: Vec<StepperState>,
    next_id: u8,
}

impl StepperPool {
    pub fn new(capacity: u8) -> Self {
        Self {
            slots: (0..capacity).map(|_| StepperState::default()).collect(),
            next_id: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn assigned(&self) -> usize {
        self.next_id as usize
    }

    /// Claim the next free motor id.
    pub fn assign(&mut self) -> Result<u8> {
        let id = self.next_id;
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(Error::ResourceExhausted(Resource::Steppers))?;
        slot.instance_created = true;
        slot.phase = StepperPhase::Assigned;
        self.next_id += 1;
        Ok(id)
    }

    pub fn slot(&self, id: u8) -> Result<&StepperState> {
        self.slots
            .get(id as usize)
            .filter(|s| s.instance_created)
            .ok_or(Error::NotEnabled(Peripheral::Stepper(id)))
    }

    fn slot_mut(&mut self, id: u8) -> Result<&mut StepperState> {
        self.slots
            .get_mut(id as usize)
            .filter(|s| s.instance_created)
            .ok_or(Error::NotEnabled(Peripheral::Stepper(id)))
    }

    /// Fail with `NotEnabled` unless `id` names an assigned slot.
    pub fn require(&self, id: u8) -> Result<()> {
        self.slot(id).map(|_| ())
    }

    // ── Local bookkeeping (no wire round trip) ────────────────

    pub fn set_max_speed(&mut self, id: u8, value: u16) -> Result<()> {
        let slot = self.slot_mut(id)?;
        slot.max_speed = check_motion("max speed", value)?;
        slot.configure();
        Ok(())
    }

    pub fn set_speed(&mut self, id: u8, value: u16) -> Result<()> {
        let slot = self.slot_mut(id)?;
        slot.speed = check_motion("speed", value)?;
        slot.configure();
        Ok(())
    }

    pub fn set_acceleration(&mut self, id: u8, value: u16) -> Result<()> {
        let slot = self.slot_mut(id)?;
        slot.acceleration = check_motion("acceleration", value)?;
        slot.configure();
        Ok(())
    }

    pub fn max_speed(&self, id: u8) -> Result<u16> {
        self.slot(id).map(|s| s.max_speed)
    }

    pub fn speed(&self, id: u8) -> Result<u16> {
        self.slot(id).map(|s| s.speed)
    }

    pub fn acceleration(&self, id: u8) -> Result<u16> {
        self.slot(id).map(|s| s.acceleration)
    }

    pub fn phase(&self, id: u8) -> Result<StepperPhase> {
        self.slot(id).map(|s| s.phase)
    }

    pub fn mark_running(&mut self, id: u8) -> Result<()> {
        self.slot_mut(id)?.phase = StepperPhase::Running;
        Ok(())
    }

    pub fn mark_stopped(&mut self, id: u8) -> Result<()> {
        self.slot_mut(id)?.phase = StepperPhase::Stopped;
        Ok(())
    }

    // ── Report callbacks ──────────────────────────────────────

    /// Attach a report callback; last write wins.
    pub fn set_callback(&mut self, id: u8, kind: StepperReport, cb: Callback) -> Result<()> {
        self.slot_mut(id)?.callbacks[kind.index()] = Some(cb);
        Ok(())
    }

    /// Remove a callback so it can run without the pool borrowed.
    pub fn take_callback(&mut self, id: u8, kind: StepperReport) -> Option<Callback> {
        self.slot_mut(id).ok()?.callbacks[kind.index()].take()
    }

    /// Put a callback back unless a newer one was registered meanwhile.
    pub fn restore_callback(&mut self, id: u8, kind: StepperReport, cb: Callback) {
        if let Ok(slot) = self.slot_mut(id) {
            let entry = &mut slot.callbacks[kind.index()];
            if entry.is_none() {
                *entry = Some(cb);
            }
        }
    }
}

impl StepperState {
    fn configure(&mut self) {
        if self.phase == StepperPhase::Assigned {
            self.phase = StepperPhase::Configured;
        }
    }
}

fn check_motion(field: &'static str, value: u16) -> Result<u16> {
    if MOTION_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidRange {
            field,
            value: i64::from(value),
        })
    }
}

// ── Wire encodings ────────────────────────────────────────────

/// Absolute/relative position: 4-byte big-endian magnitude followed by a
/// polarity byte (1 = negative). Not two's complement.
///
/// The firmware rebuilds a signed 32-bit value from the magnitude, so
/// `i32::MIN` (magnitude 2^31) has no encoding and is rejected.
pub fn encode_position(position: i32) -> Result<[u8; 5]> {
    if position == i32::MIN {
        return Err(Error::InvalidRange {
            field: "stepper position",
            value: i64::from(position),
        });
    }
    let magnitude = position.unsigned_abs().to_be_bytes();
    Ok([
        magnitude[0],
        magnitude[1],
        magnitude[2],
        magnitude[3],
        u8::from(position < 0),
    ])
}

/// SET_CURRENT_POSITION carries a plain big-endian signed value.
pub fn encode_current_position(position: i32) -> [u8; 4] {
    position.to_be_bytes()
}
