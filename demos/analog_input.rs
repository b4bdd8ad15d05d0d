//! Print ADC readings from GPIO 36 whenever they move by more than the
//! differential.
//!
//! cargo run --example analog_input -- 192.168.2.220

use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::info;
use telemetrix_esp32::{Report, ReportEvent, Session, SessionConfig};

const ADC_PIN: u8 = 36;
const DIFFERENTIAL: u16 = 8;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = SessionConfig::default();
    if let Some(address) = std::env::args().nth(1) {
        config.address = address;
    }

    let board = Session::connect(config)?;
    board.set_analog_scan_interval(50)?;
    board.set_pin_mode_analog_input(
        ADC_PIN,
        DIFFERENTIAL,
        Box::new(|e: &ReportEvent| {
            if let Report::Analog { pin, value } = e.report {
                info!("GPIO {pin}: {value}");
            }
        }),
    )?;

    thread::sleep(Duration::from_secs(30));
    board.shutdown();
    if let Some(fault) = board.fault() {
        anyhow::bail!("reader stopped early: {fault}");
    }
    Ok(())
}
