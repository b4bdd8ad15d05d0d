//! Session lifecycle and pin-level commands against the scripted firmware.

use std::time::Duration;

use telemetrix_esp32::error::{ProtocolFault, Resource};
use telemetrix_esp32::pins::PinFamily;
use telemetrix_esp32::{Error, FirmwareVersion, PinMode, Report, Session, SessionConfig};

use crate::mock_link::{
    ENABLE_ALL_REPORTS, GET_FIRMWARE_VERSION, MockFirmware, MockGatt, RESET, STOP_ALL_REPORTS,
    channel_callback, handshake_only, silent, test_config, wait_until,
};

const WAIT: Duration = Duration::from_secs(2);

fn started() -> (Session, MockFirmware) {
    let fw = MockFirmware::new(handshake_only());
    let session = Session::new(test_config(), fw.link()).expect("handshake");
    (session, fw)
}

// ── Handshake ─────────────────────────────────────────────────

#[test]
fn handshake_reports_firmware_version_and_enables_reports() {
    let (session, fw) = started();

    assert_eq!(
        session.firmware_version(),
        Some(FirmwareVersion {
            major: 1,
            minor: 0,
            patch: 3
        })
    );
    assert_eq!(
        fw.written(),
        vec![GET_FIRMWARE_VERSION.to_vec(), ENABLE_ALL_REPORTS.to_vec()]
    );
    assert!(session.reporting_enabled().all);
}

#[test]
fn silent_firmware_fails_the_handshake_and_shuts_down() {
    let fw = MockFirmware::new(silent());
    let config = SessionConfig {
        firmware_timeout_ms: 50,
        shutdown_on_fault: true,
        ..test_config()
    };

    let result = Session::new(config, fw.link());

    assert!(matches!(
        result,
        Err(Error::ProtocolMismatch(ProtocolFault::NoFirmwareVersion))
    ));
    assert_eq!(
        fw.written(),
        vec![
            GET_FIRMWARE_VERSION.to_vec(),
            STOP_ALL_REPORTS.to_vec(),
            RESET.to_vec()
        ]
    );
}

#[test]
fn silent_firmware_without_fault_shutdown_sends_nothing_more() {
    let fw = MockFirmware::new(silent());
    let config = SessionConfig {
        firmware_timeout_ms: 50,
        auto_start: false,
        shutdown_on_fault: false,
        ..test_config()
    };
    let session = Session::new(config, fw.link()).unwrap();

    assert_eq!(
        session.start(),
        Err(Error::ProtocolMismatch(ProtocolFault::NoFirmwareVersion))
    );
    assert!(session.is_shut_down());
    session.shutdown();
    drop(session);

    assert_eq!(fw.written(), vec![GET_FIRMWARE_VERSION.to_vec()]);
}

#[test]
fn manual_start_when_auto_start_is_off() {
    let fw = MockFirmware::new(handshake_only());
    let config = SessionConfig {
        auto_start: false,
        ..test_config()
    };
    let session = Session::new(config, fw.link()).unwrap();
    assert!(fw.written().is_empty(), "nothing is sent before start()");

    let version = session.start().unwrap();
    assert_eq!(version.to_string(), "1.0.3");
    assert_eq!(
        session.start(),
        Err(Error::Config("session already started"))
    );
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_stops_reports_then_resets() {
    let (session, fw) = started();
    let before = fw.written_count();

    session.shutdown();

    assert!(session.is_shut_down());
    assert_eq!(
        fw.written_since(before),
        vec![STOP_ALL_REPORTS.to_vec(), RESET.to_vec()]
    );
    assert!(!session.reporting_enabled().all);
}

#[test]
fn shutdown_is_idempotent() {
    let (session, fw) = started();
    session.shutdown();
    let after_first = fw.written_count();

    session.shutdown();
    drop(session);

    assert_eq!(fw.written_count(), after_first);
}

#[test]
fn shutdown_without_restart_skips_reset() {
    let fw = MockFirmware::new(handshake_only());
    let config = SessionConfig {
        restart_on_shutdown: false,
        ..test_config()
    };
    let session = Session::new(config, fw.link()).unwrap();
    let before = fw.written_count();

    session.shutdown();

    assert_eq!(fw.written_since(before), vec![STOP_ALL_REPORTS.to_vec()]);
}

// ── Pin validation ────────────────────────────────────────────

#[test]
fn invalid_pin_is_rejected_without_a_write() {
    let (session, fw) = started();
    let before = fw.written_count();
    let (cb, _rx) = channel_callback();

    assert_eq!(
        session.set_pin_mode_analog_input(2, 0, cb),
        Err(Error::InvalidPin {
            pin: 2,
            family: PinFamily::AnalogInput
        })
    );
    assert_eq!(
        session.digital_write(34, true),
        Err(Error::InvalidPin {
            pin: 34,
            family: PinFamily::DigitalOutput
        })
    );
    assert_eq!(fw.written_count(), before);
    assert!(!session.is_shut_down(), "fault shutdown is off in test_config");
}

#[test]
fn reporting_mode_without_callback_is_rejected() {
    let (session, fw) = started();
    let before = fw.written_count();

    assert_eq!(
        session.set_pin_mode(36, PinMode::Analog, 0, None),
        Err(Error::MissingCallback("set_pin_mode"))
    );
    assert_eq!(fw.written_count(), before);
}

#[test]
fn fault_policy_shuts_down_on_invalid_argument() {
    let fw = MockFirmware::new(handshake_only());
    let config = SessionConfig {
        shutdown_on_fault: true,
        ..test_config()
    };
    let session = Session::new(config, fw.link()).unwrap();

    assert!(session.servo_write(13, 181).is_err());

    assert!(session.is_shut_down());
    assert!(fw.written().ends_with(&[STOP_ALL_REPORTS.to_vec(), RESET.to_vec()]));
}

#[test]
fn default_policy_ends_the_session_on_a_rejected_pin() {
    let fw = MockFirmware::new(handshake_only());
    let config = SessionConfig {
        shutdown_on_fault: SessionConfig::default().shutdown_on_fault,
        ..test_config()
    };
    let session = Session::new(config, fw.link()).unwrap();
    let before = fw.written_count();

    assert!(matches!(
        session.digital_write(34, true),
        Err(Error::InvalidPin { pin: 34, .. })
    ));

    assert!(session.is_shut_down());
    assert_eq!(
        fw.written_since(before),
        vec![STOP_ALL_REPORTS.to_vec(), RESET.to_vec()]
    );
}

#[test]
fn pin_mode_frames_match_the_firmware_layout() {
    let (session, fw) = started();
    let before = fw.written_count();
    let (cb, _rx) = channel_callback();

    session.set_pin_mode_digital_output(2).unwrap();
    session.digital_write(2, true).unwrap();
    session.set_pin_mode_analog_input(36, 5, cb).unwrap();

    assert_eq!(
        fw.written_since(before),
        vec![vec![3, 1, 2, 1], vec![3, 2, 2, 1], vec![6, 1, 36, 3, 0, 5, 1]]
    );
    assert!(session.reporting_enabled().analog.contains(&36));
}

// ── Report routing ────────────────────────────────────────────

#[test]
fn analog_report_reaches_its_callback() {
    let (session, fw) = started();
    let (cb, rx) = channel_callback();
    session.set_pin_mode_analog_input(36, 0, cb).unwrap();

    fw.inject(&[4, 3, 36, 0, 200]);

    let event = rx.recv_timeout(WAIT).expect("analog report");
    assert_eq!(event.report, Report::Analog { pin: 36, value: 200 });
    assert_eq!(session.fault(), None);
}

#[test]
fn loop_back_echoes_the_value() {
    let fw = MockFirmware::new(Box::new(|frame: &[u8]| match frame {
        [1, 5] => vec![vec![4, 5, 1, 0, 3]],
        [2, 0, v] => vec![vec![2, 0, *v]],
        _ => Vec::new(),
    }));
    let session = Session::new(test_config(), fw.link()).unwrap();
    let (cb, rx) = channel_callback();

    session.loop_back(b'A', cb).unwrap();

    let event = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(event.report, Report::Loopback { value: b'A' });
}

#[test]
fn unknown_report_id_halts_the_reader() {
    let (session, fw) = started();
    let (cb, rx) = channel_callback();
    session.set_pin_mode_analog_input(36, 0, cb).unwrap();

    fw.inject(&[2, 42, 0]);
    fw.inject(&[4, 3, 36, 0, 1]);

    assert!(wait_until(WAIT, || session.fault().is_some()));
    assert_eq!(
        session.fault(),
        Some(Error::ProtocolMismatch(ProtocolFault::UnknownReport(42)))
    );
    assert!(
        rx.recv_timeout(Duration::from_millis(50)).is_err(),
        "nothing is dispatched after a halt"
    );
}

#[test]
fn closed_peer_is_recorded_as_a_transport_fault() {
    let (session, fw) = started();
    fw.hang_up();
    assert!(wait_until(WAIT, || session.fault().is_some()));
    assert!(matches!(session.fault(), Some(Error::TransportFailure(_))));
}

// ── Capacity ──────────────────────────────────────────────────

#[test]
fn dht_ceiling_admits_one_less_than_configured() {
    let (session, _fw) = started();

    for pin in [4, 5, 12, 13, 14] {
        let (cb, _rx) = channel_callback();
        session.set_pin_mode_dht(pin, cb).unwrap();
    }
    let (cb, _rx) = channel_callback();
    assert_eq!(
        session.set_pin_mode_dht(16, cb),
        Err(Error::ResourceExhausted(Resource::Dhts))
    );
}

#[test]
fn dht_report_routes_by_pin() {
    let (session, fw) = started();
    let (cb, rx) = channel_callback();
    session.set_pin_mode_dht(4, cb).unwrap();

    // humidity 45.5, temperature 23.25 as little-endian f32
    fw.inject(&[11, 11, 0, 4, 0, 0, 54, 66, 0, 0, 186, 65]);

    let event = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(
        event.report,
        Report::DhtData {
            pin: 4,
            humidity: 45.5,
            temperature: 23.25
        }
    );
}

// ── Push link ─────────────────────────────────────────────────

#[test]
fn push_link_handshakes_and_routes_notifications() {
    let gatt = MockGatt::new();
    let session = Session::new(test_config(), gatt.link()).unwrap();
    assert_eq!(session.firmware_version().map(|v| v.major), Some(1));

    let (cb, rx) = channel_callback();
    session.set_pin_mode_digital_input(4, cb).unwrap();
    // Two frames in one notification.
    gatt.notify(&[3, 2, 4, 1, 3, 2, 4, 0]);

    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().report,
        Report::Digital { pin: 4, value: 1 }
    );
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().report,
        Report::Digital { pin: 4, value: 0 }
    );

    session.shutdown();
    assert!(!gatt.subscribed());
    assert!(gatt.written().ends_with(&[STOP_ALL_REPORTS.to_vec(), RESET.to_vec()]));
}
