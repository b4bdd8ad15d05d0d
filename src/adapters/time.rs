//! Host clock adapter.
//!
//! Report timestamps are wall-clock time taken when the frame is decoded;
//! the firmware never sends a time of its own.

use std::time::SystemTime;

use crate::app::ports::Clock;

/// [`Clock`] backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
