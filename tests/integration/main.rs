//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one subsystem through a
//! full [`Session`](telemetrix_esp32::Session) against a scripted firmware
//! (`mock_link`) or a loopback socket. No ESP32 required.

mod mock_link;
mod onewire_tests;
mod session_tests;
mod stepper_tests;
mod tcp_tests;
