//! Session configuration parameters
//!
//! Everything needed to construct a [`Session`](crate::app::Session):
//! which link to use, the fault policy, and the protocol tunables.
//! Values can be loaded from a JSON file or carried as a postcard blob.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default TCP port the firmware listens on.
pub const DEFAULT_TCP_PORT: u16 = 31336;

/// Which physical link carries the byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    /// BLE GATT (Nordic UART service). `address` is the peripheral's
    /// advertised name or MAC.
    Ble,
    /// WiFi TCP socket. `address` is a host name or IP.
    Tcp,
}

/// Core session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    // --- Link ---
    pub transport: TransportKind,
    /// BLE identifier or network address.
    pub address: String,
    /// TCP port (ignored for BLE)
    pub port: u16,

    // --- Lifecycle ---
    /// Run the firmware handshake from `Session::new`
    pub auto_start: bool,
    /// Run the shutdown sequence before returning any fault (default on)
    pub shutdown_on_fault: bool,
    /// Send RESET to the firmware on shutdown
    pub restart_on_shutdown: bool,

    // --- Timing ---
    /// How long `start()` waits for the firmware version report (ms)
    pub firmware_timeout_ms: u32,
    /// Pause after the reset command before tearing down (ms)
    pub reset_settle_ms: u32,
    /// Reader idle timeout; bounds shutdown latency (ms)
    pub poll_interval_ms: u32,
    /// Per-step reply timeout for OneWire transactions (ms)
    pub onewire_reply_timeout_ms: u32,
    /// DS18B20 12-bit conversion time (ms)
    pub onewire_conversion_ms: u32,

    // --- Capacity ---
    pub max_steppers: u8,
    pub max_sonars: u8,
    pub max_dhts: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            address: String::from("192.168.2.220"),
            port: DEFAULT_TCP_PORT,

            auto_start: true,
            shutdown_on_fault: true,
            restart_on_shutdown: true,

            firmware_timeout_ms: 4000,
            reset_settle_ms: 1000,
            poll_interval_ms: 100,
            onewire_reply_timeout_ms: 2000,
            onewire_conversion_ms: 750,

            max_steppers: 4,
            max_sonars: 6,
            max_dhts: 6,
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a JSON file. Missing fields are an error.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate().map_err(anyhow::Error::new)?;
        Ok(config)
    }

    /// Reject values the session cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.address.is_empty() {
            return Err(crate::Error::Config("address must not be empty"));
        }
        if self.transport == TransportKind::Tcp && self.port == 0 {
            return Err(crate::Error::Config("TCP port must be nonzero"));
        }
        if self.max_steppers == 0 {
            return Err(crate::Error::Config("max_steppers must be nonzero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::Config("poll_interval_ms must be nonzero"));
        }
        Ok(())
    }

    pub fn firmware_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.firmware_timeout_ms))
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(u64::from(self.reset_settle_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn onewire_reply_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.onewire_reply_timeout_ms))
    }

    pub fn onewire_conversion(&self) -> Duration {
        Duration::from_millis(u64::from(self.onewire_conversion_ms))
    }
}
