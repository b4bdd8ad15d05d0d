//! Enumerate a OneWire bus on GPIO 4 and poll every DS18B20 on it.
//!
//! cargo run --example onewire_ds18b20 -- 192.168.2.220

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use telemetrix_esp32::{Session, SessionConfig};

const BUS_PIN: u8 = 4;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = SessionConfig::default();
    if let Some(address) = std::env::args().nth(1) {
        config.address = address;
    }

    let board = Session::connect(config)?;
    let bus = board.onewire_bus(BUS_PIN)?;
    let sensors = bus.discover().context("OneWire discovery")?;
    if sensors.is_empty() {
        warn!("no devices on GPIO {BUS_PIN}");
    }

    for _ in 0..5 {
        for rom in &sensors {
            match bus.read_temperature(Some(rom)) {
                Ok(celsius) => info!("{rom:02x?}: {celsius:.2} °C"),
                Err(e) => warn!("{rom:02x?}: {e}"),
            }
        }
        thread::sleep(Duration::from_secs(2));
    }

    drop(bus);
    board.shutdown();
    Ok(())
}
