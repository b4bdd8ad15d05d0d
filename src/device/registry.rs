//! Device registry: who owns each report stream.
//!
//! Maps a [`DeviceKey`] to the single callback that consumes its reports,
//! enforces the sonar/DHT ceilings, and tracks which buses have been
//! initialised. The session's public API writes it; the dispatcher reads
//! it. Both sides go through one mutex, and callbacks run with the lock
//! released (see [`Registry::take`] / [`Registry::restore`]).

use std::collections::{BTreeSet, HashMap};

use heapless::Vec;
use log::debug;

use crate::config::SessionConfig;
use crate::device::stepper::StepperPool;
use crate::error::{Error, Peripheral, Resource, Result};
use crate::pins::PinFamily;
use crate::protocol::report::ReportEvent;

/// Report consumer. Runs on the reader thread (or the BLE notification
/// context), one report at a time; it must not block on further reports.
pub type Callback = Box<dyn FnMut(&ReportEvent) + Send>;

/// Maximum chip-select pins passed to SPI_INIT.
pub const MAX_CS_PINS: usize = 16;

/// Routing key for a report stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKey {
    Loopback,
    Digital(u8),
    Analog(u8),
    Touch(u8),
    Dht(u8),
    /// Keyed by trigger pin.
    Sonar(u8),
    I2c,
    Spi,
    OneWire,
}

/// Which report streams the firmware was told to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportingState {
    pub all: bool,
    pub digital: BTreeSet<u8>,
    pub analog: BTreeSet<u8>,
}

/// Bus init flags and chip selects.
#[derive(Debug, Clone, Default)]
pub struct BusState {
    pub i2c: bool,
    pub spi: bool,
    pub onewire: bool,
    pub cs_pins: Vec<u8, MAX_CS_PINS>,
}

pub struct Registry {
    callbacks: HashMap<DeviceKey, Callback>,
    dht_count: u8,
    sonar_count: u8,
    max_dhts: u8,
    max_sonars: u8,
    pub steppers: StepperPool,
    pub buses: BusState,
    pub reporting: ReportingState,
}

impl Registry {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            callbacks: HashMap::new(),
            dht_count: 0,
            sonar_count: 0,
            max_dhts: config.max_dhts,
            max_sonars: config.max_sonars,
            steppers: StepperPool::new(config.max_steppers),
            buses: BusState::default(),
            reporting: ReportingState::default(),
        }
    }

    /// Pure set-membership check against the static capability tables.
    pub fn resolve_pin_capability(pin: u8, family: PinFamily) -> bool {
        family.supports(pin)
    }

    /// [`resolve_pin_capability`](Self::resolve_pin_capability) as a `Result`.
    pub fn require_pin(pin: u8, family: PinFamily) -> Result<()> {
        if Self::resolve_pin_capability(pin, family) {
            Ok(())
        } else {
            Err(Error::InvalidPin { pin, family })
        }
    }

    /// Install the owner of `key`. Last write wins.
    pub fn register(&mut self, key: DeviceKey, cb: Callback) {
        if self.callbacks.insert(key, cb).is_some() {
            debug!("registry: replaced callback for {key:?}");
        }
    }

    pub fn unregister(&mut self, key: DeviceKey) -> Option<Callback> {
        self.callbacks.remove(&key)
    }

    pub fn lookup(&mut self, key: DeviceKey) -> Option<&mut Callback> {
        self.callbacks.get_mut(&key)
    }

    pub fn contains(&self, key: DeviceKey) -> bool {
        self.callbacks.contains_key(&key)
    }

    /// Remove the callback so it can be invoked with the lock released.
    pub fn take(&mut self, key: DeviceKey) -> Option<Callback> {
        self.callbacks.remove(&key)
    }

    /// Return a taken callback unless the key was re-registered meanwhile.
    pub fn restore(&mut self, key: DeviceKey, cb: Callback) {
        self.callbacks.entry(key).or_insert(cb);
    }

    // ── Capacity-checked registrations ────────────────────────

    /// DHT sensors. The ceiling admits `max_dhts - 1` sensors.
    pub fn register_dht(&mut self, pin: u8, cb: Callback) -> Result<()> {
        if self.dht_count >= self.max_dhts.saturating_sub(1) {
            return Err(Error::ResourceExhausted(Resource::Dhts));
        }
        self.register(DeviceKey::Dht(pin), cb);
        self.dht_count += 1;
        Ok(())
    }

    /// Sonars, keyed by trigger pin. The ceiling admits `max_sonars - 1`.
    pub fn register_sonar(&mut self, trigger_pin: u8, cb: Callback) -> Result<()> {
        if self.sonar_count >= self.max_sonars.saturating_sub(1) {
            return Err(Error::ResourceExhausted(Resource::Sonars));
        }
        self.register(DeviceKey::Sonar(trigger_pin), cb);
        self.sonar_count += 1;
        Ok(())
    }

    pub fn dht_count(&self) -> u8 {
        self.dht_count
    }

    pub fn sonar_count(&self) -> u8 {
        self.sonar_count
    }

    // ── Bus preconditions ─────────────────────────────────────

    pub fn require_i2c(&self) -> Result<()> {
        if self.buses.i2c {
            Ok(())
        } else {
            Err(Error::NotEnabled(Peripheral::I2c))
        }
    }

    pub fn require_spi(&self) -> Result<()> {
        if self.buses.spi {
            Ok(())
        } else {
            Err(Error::NotEnabled(Peripheral::Spi))
        }
    }

    pub fn require_chip_select(&self, pin: u8) -> Result<()> {
        self.require_spi()?;
        if self.buses.cs_pins.contains(&pin) {
            Ok(())
        } else {
            Err(Error::NotEnabled(Peripheral::SpiChipSelect(pin)))
        }
    }

    pub fn require_onewire(&self) -> Result<()> {
        if self.buses.onewire {
            Ok(())
        } else {
            Err(Error::NotEnabled(Peripheral::OneWire))
        }
    }
}
