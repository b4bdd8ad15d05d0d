//! Stepper pool, motion commands and stepper reports end to end.

use std::time::Duration;

use telemetrix_esp32::device::stepper::StepperPhase;
use telemetrix_esp32::error::{Peripheral, Resource};
use telemetrix_esp32::pins::PinFamily;
use telemetrix_esp32::{Error, Report, Session};

use crate::mock_link::{MockFirmware, channel_callback, handshake_only, test_config};

const WAIT: Duration = Duration::from_secs(2);
const DRIVER: u8 = 1;

fn started() -> (Session, MockFirmware) {
    let fw = MockFirmware::new(handshake_only());
    let session = Session::new(test_config(), fw.link()).expect("handshake");
    (session, fw)
}

#[test]
fn motor_ids_are_assigned_in_order_until_the_pool_is_full() {
    let (session, fw) = started();

    assert_eq!(session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true), Ok(0));
    assert_eq!(session.set_pin_mode_stepper(DRIVER, [27, 14, 0, 0], true), Ok(1));
    assert_eq!(session.set_pin_mode_stepper(DRIVER, [12, 13, 0, 0], false), Ok(2));
    assert_eq!(session.set_pin_mode_stepper(DRIVER, [4, 5, 0, 0], false), Ok(3));

    let before = fw.written_count();
    assert_eq!(
        session.set_pin_mode_stepper(DRIVER, [18, 19, 0, 0], true),
        Err(Error::ResourceExhausted(Resource::Steppers))
    );
    assert_eq!(fw.written_count(), before);
}

#[test]
fn creation_frame_carries_all_four_pins_and_enable_flag() {
    let (session, fw) = started();
    let before = fw.written_count();

    session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true).unwrap();

    assert_eq!(fw.written_since(before), vec![vec![8, 36, 0, 1, 25, 26, 0, 0, 1]]);
}

#[test]
fn stepper_pins_are_checked_for_the_interface_width() {
    let (session, _fw) = started();

    // Full4Wire uses every pin; 34 is input-only.
    assert_eq!(
        session.set_pin_mode_stepper(4, [25, 26, 27, 34], true),
        Err(Error::InvalidPin {
            pin: 34,
            family: PinFamily::DigitalOutput
        })
    );
    // The driver interface ignores pins 3 and 4.
    assert!(session.set_pin_mode_stepper(DRIVER, [25, 26, 34, 39], true).is_ok());
    assert!(matches!(
        session.set_pin_mode_stepper(5, [25, 26, 27, 14], true),
        Err(Error::InvalidRange { .. })
    ));
}

#[test]
fn motion_values_outside_range_never_reach_the_wire() {
    let (session, fw) = started();
    let id = session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true).unwrap();
    let before = fw.written_count();

    for bad in [0, 1001, u16::MAX] {
        assert!(matches!(
            session.stepper_set_max_speed(id, bad),
            Err(Error::InvalidRange { .. })
        ));
        assert!(session.stepper_set_speed(id, bad).is_err());
        assert!(session.stepper_set_acceleration(id, bad).is_err());
    }
    assert_eq!(fw.written_count(), before);

    session.stepper_set_max_speed(id, 1000).unwrap();
    session.stepper_set_acceleration(id, 1).unwrap();
    assert_eq!(session.stepper_get_max_speed(id), Ok(1000));
    assert_eq!(session.stepper_get_acceleration(id), Ok(1));
    assert_eq!(
        fw.written_since(before),
        vec![vec![4, 41, id, 0x03, 0xE8], vec![4, 42, id, 0, 1]]
    );
}

#[test]
fn unassigned_motor_is_not_enabled() {
    let (session, fw) = started();
    let before = fw.written_count();

    assert_eq!(
        session.stepper_move_to(2, 100),
        Err(Error::NotEnabled(Peripheral::Stepper(2)))
    );
    assert_eq!(
        session.stepper_run_speed(0),
        Err(Error::NotEnabled(Peripheral::Stepper(0)))
    );
    assert_eq!(fw.written_count(), before);
}

#[test]
fn positions_use_magnitude_and_polarity() {
    let (session, fw) = started();
    let id = session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true).unwrap();
    let before = fw.written_count();

    session.stepper_move_to(id, -1000).unwrap();
    session.stepper_move(id, 258).unwrap();
    session.stepper_set_current_position(id, -1).unwrap();

    assert_eq!(
        fw.written_since(before),
        vec![
            vec![7, 37, id, 0, 0, 0x03, 0xE8, 1],
            vec![7, 38, id, 0, 0, 1, 2, 0],
            vec![6, 44, id, 0xFF, 0xFF, 0xFF, 0xFF],
        ]
    );
}

#[test]
fn most_negative_position_never_reaches_the_wire() {
    let (session, fw) = started();
    let id = session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true).unwrap();
    let before = fw.written_count();

    assert!(matches!(
        session.stepper_move_to(id, i32::MIN),
        Err(Error::InvalidRange { .. })
    ));
    assert!(session.stepper_move(id, i32::MIN).is_err());
    assert_eq!(fw.written_count(), before);

    session.stepper_move(id, -i32::MAX).unwrap();
    assert_eq!(
        fw.written_since(before),
        vec![vec![7, 38, id, 0x7F, 0xFF, 0xFF, 0xFF, 1]]
    );
}

#[test]
fn run_complete_report_stops_the_motor_and_fires_callback() {
    let (session, fw) = started();
    let id = session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true).unwrap();
    let (cb, rx) = channel_callback();

    session.stepper_move_to(id, 400).unwrap();
    session.stepper_run(id, cb).unwrap();
    assert_eq!(session.stepper_phase(id), Ok(StepperPhase::Running));

    fw.inject(&[2, 19, id]);

    let event = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(event.report, Report::StepperRunComplete { motor_id: id });
    assert_eq!(session.stepper_phase(id), Ok(StepperPhase::Stopped));
}

#[test]
fn position_queries_are_answered_by_reports() {
    let (session, fw) = started();
    let id = session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true).unwrap();
    let (cb, rx) = channel_callback();

    session.stepper_get_current_position(id, cb).unwrap();
    assert_eq!(fw.written().last(), Some(&vec![2, 54, id]));

    fw.inject(&[6, 17, id, 0xFF, 0xFF, 0xFF, 0x9C]);

    let event = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(
        event.report,
        Report::StepperCurrentPosition {
            motor_id: id,
            position: -100
        }
    );
}

#[test]
fn stop_marks_the_motor_stopped() {
    let (session, fw) = started();
    let id = session.set_pin_mode_stepper(DRIVER, [25, 26, 0, 0], true).unwrap();

    session.stepper_run_speed(id).unwrap();
    session.stepper_stop(id).unwrap();

    assert_eq!(session.stepper_phase(id), Ok(StepperPhase::Stopped));
    assert_eq!(fw.written().last(), Some(&vec![2, 46, id]));
}
