//! Spin a step/direction driver (STEP=25, DIR=26) at constant speed, then
//! report where it ended up.
//!
//! cargo run --example stepper_continuous -- 192.168.2.220

use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::bounded;
use log::info;
use telemetrix_esp32::{Report, ReportEvent, Session, SessionConfig};

const DRIVER_INTERFACE: u8 = 1;
const STEP_PIN: u8 = 25;
const DIR_PIN: u8 = 26;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = SessionConfig::default();
    if let Some(address) = std::env::args().nth(1) {
        config.address = address;
    }

    let board = Session::connect(config)?;
    let motor = board.set_pin_mode_stepper(DRIVER_INTERFACE, [STEP_PIN, DIR_PIN, 0, 0], true)?;
    board.stepper_set_max_speed(motor, 1000)?;
    board.stepper_set_speed(motor, 500)?;
    board.stepper_run_speed(motor)?;

    thread::sleep(Duration::from_secs(5));
    board.stepper_stop(motor)?;

    let (tx, rx) = bounded(1);
    board.stepper_get_current_position(
        motor,
        Box::new(move |e: &ReportEvent| {
            if let Report::StepperCurrentPosition { position, .. } = e.report {
                let _ = tx.try_send(position);
            }
        }),
    )?;
    let position = rx.recv_timeout(Duration::from_secs(2))?;
    info!("motor {motor} stopped at {position} steps");

    board.shutdown();
    Ok(())
}
