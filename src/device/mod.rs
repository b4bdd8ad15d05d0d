//! Client-side device state: report ownership, stepper slots and the
//! OneWire bus controller.

pub mod onewire;
pub mod registry;
pub mod stepper;
