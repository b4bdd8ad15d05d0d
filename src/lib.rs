//! Host-side driver for the Telemetrix4ESP32 firmware.
//!
//! Drives an ESP32's GPIO, PWM, DAC, servo, stepper, I2C, SPI, OneWire,
//! sonar, DHT and touch peripherals over a TCP socket or a BLE (Nordic
//! UART) link. Commands go out as length-prefixed frames; reports come
//! back on a single reader and are routed to per-device callbacks.
//!
//! ```text
//!   app::Session ──▶ protocol::codec ──▶ CommandSink ──▶ firmware
//!        │                                                  │
//!        ▼                                                  ▼
//!   device::Registry ◀── protocol::Dispatcher ◀── ReportSource / notify
//! ```
//!
//! The library logs through `log` and never installs a logger.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod device;
pub mod error;
pub mod pins;
pub mod protocol;

pub use app::{Link, Session};
pub use config::{SessionConfig, TransportKind};
pub use device::registry::Callback;
pub use error::{Error, Result};
pub use protocol::opcodes::PinMode;
pub use protocol::report::{FirmwareVersion, Report, ReportEvent};
