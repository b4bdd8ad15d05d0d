//! Blink the on-board LED (GPIO 2) over WiFi.
//!
//! cargo run --example blink -- 192.168.2.220

use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::info;
use telemetrix_esp32::{Session, SessionConfig};

const LED: u8 = 2;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = SessionConfig::default();
    if let Some(address) = std::env::args().nth(1) {
        config.address = address;
    }

    let board = Session::connect(config)?;
    board.set_pin_mode_digital_output(LED)?;

    for i in 0..10 {
        let on = i % 2 == 0;
        info!("LED {}", if on { "on" } else { "off" });
        board.digital_write(LED, on)?;
        thread::sleep(Duration::from_secs(1));
    }

    board.shutdown();
    Ok(())
}
