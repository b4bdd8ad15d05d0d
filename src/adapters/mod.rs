//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter         | Implements                            | Connects to              |
//! |-----------------|---------------------------------------|--------------------------|
//! | `tcp_transport` | CommandSink, ReportSource             | Firmware TCP socket      |
//! | `ble_transport` | CommandSink, NotificationSource       | NUS via a `GattClient`   |
//! | `time`          | Clock                                 | Host wall clock          |
//! | `thread`        |                                       | Reader thread spawning   |

pub mod ble_transport;
pub mod tcp_transport;
pub mod thread;
pub mod time;
