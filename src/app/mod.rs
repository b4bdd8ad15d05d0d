//! Application layer: the client session and the port traits it is
//! written against.
//!
//! [`Session`] is split by concern across `session` (lifecycle, reporting
//! control), `gpio`, `buses` and `motion` (the command surface). Everything
//! that touches a socket or a radio sits behind [`ports`].

mod buses;
mod gpio;
mod motion;
pub mod ports;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use gpio::{PWM_CHANNELS, PWM_FREQUENCY_HZ, PWM_RESOLUTION_BITS, SERVO_MAX_ANGLE};
pub use motion::NO_ENABLE_PIN;
pub use session::{Link, Session};
