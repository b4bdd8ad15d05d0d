//! `Session::connect` over a real loopback socket.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use telemetrix_esp32::{Error, Session, SessionConfig, TransportKind};

use crate::mock_link::{FIRMWARE_1_0_3, test_config};

/// Accept one client, answer the handshake, then record everything it
/// sends until it hangs up.
fn fake_firmware() -> (u16, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut hello = [0u8; 2];
        stream.read_exact(&mut hello).unwrap();
        assert_eq!(hello, [1, 5]);
        stream.write_all(&FIRMWARE_1_0_3).unwrap();

        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
        rest
    });
    (port, handle)
}

#[test]
fn tcp_session_round_trip() {
    let (port, firmware) = fake_firmware();
    let config = SessionConfig {
        address: String::from("127.0.0.1"),
        port,
        ..test_config()
    };

    let session = Session::connect(config).unwrap();
    assert_eq!(session.firmware_version().map(|v| v.to_string()).as_deref(), Some("1.0.3"));

    session.set_pin_mode_digital_output(2).unwrap();
    session.digital_write(2, true).unwrap();
    session.shutdown();
    drop(session);

    let received = firmware.join().unwrap();
    assert_eq!(
        received,
        [1, 16, 3, 1, 2, 1, 3, 2, 2, 1, 1, 14, 1, 20]
    );
}

#[test]
fn ble_cannot_be_opened_from_configuration_alone() {
    let config = SessionConfig {
        transport: TransportKind::Ble,
        address: String::from("Telemetrix4ESP32BLE"),
        ..test_config()
    };
    assert!(matches!(Session::connect(config), Err(Error::Config(_))));
}

#[test]
fn unreachable_address_is_a_transport_failure() {
    // Bind then drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = SessionConfig {
        address: String::from("127.0.0.1"),
        port,
        ..test_config()
    };
    assert!(matches!(
        Session::connect(config),
        Err(Error::TransportFailure(_))
    ));
}
