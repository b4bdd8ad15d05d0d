//! OneWire discovery and DS18B20 reads through a session, with the
//! firmware side simulated byte for byte.

use telemetrix_esp32::device::onewire::crc8;
use telemetrix_esp32::error::{DeviceFault, Peripheral};
use telemetrix_esp32::{Error, Session};

use crate::mock_link::{MockFirmware, Responder, channel_callback, test_config};

const BUS_PIN: u8 = 4;

fn rom(serial: u8) -> [u8; 8] {
    let mut rom = [0x28, serial, 0x00, 0x00, 0x0A, 0x0B, 0x0C, 0x00];
    rom[7] = crc8(&rom[..7]);
    rom
}

/// 25.0625 °C (raw 0x0191) with a valid CRC.
fn scratchpad() -> [u8; 9] {
    let mut pad = [0x91, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x0F, 0x10, 0x00];
    pad[8] = crc8(&pad[..8]);
    pad
}

/// A bus of DS18B20s as the firmware would present it.
fn ds18b20_bus(roms: Vec<[u8; 8]>, pad: [u8; 9], presence: u8) -> Responder {
    let mut search_at = 0usize;
    let mut read_at = 0usize;
    Box::new(move |frame: &[u8]| match frame {
        [1, 5] => vec![vec![4, 5, 1, 0, 3]],
        [1, 28] => vec![vec![3, 14, 28, presence]],
        [1, 33] => {
            search_at = 0;
            Vec::new()
        }
        [1, 34] => {
            let address = roms.get(search_at).copied().unwrap_or([0xFF; 8]);
            search_at += 1;
            let mut reply = vec![10, 14, 34];
            reply.extend_from_slice(&address);
            vec![reply]
        }
        [_, 35, covered, bytes @ ..] => {
            vec![vec![3, 14, 35, crc8(&bytes[..*covered as usize])]]
        }
        [3, 31, 0xBE, _] => {
            read_at = 0;
            Vec::new()
        }
        [1, 32] => {
            let byte = pad.get(read_at).copied().unwrap_or(0);
            read_at += 1;
            vec![vec![3, 14, 32, byte]]
        }
        _ => Vec::new(),
    })
}

fn session_on(responder: Responder) -> (Session, MockFirmware) {
    let fw = MockFirmware::new(responder);
    let session = Session::new(test_config(), fw.link()).expect("handshake");
    (session, fw)
}

#[test]
fn primitives_need_the_bus_initialised() {
    let (session, fw) = session_on(ds18b20_bus(vec![], scratchpad(), 1));
    let before = fw.written_count();
    let (cb, _rx) = channel_callback();

    assert_eq!(
        session.onewire_reset(cb),
        Err(Error::NotEnabled(Peripheral::OneWire))
    );
    assert_eq!(session.onewire_skip(), Err(Error::NotEnabled(Peripheral::OneWire)));
    assert_eq!(fw.written_count(), before);
}

#[test]
fn discovery_lists_every_device_until_the_end_marker() {
    let roms = vec![rom(1), rom(2)];
    let (session, fw) = session_on(ds18b20_bus(roms.clone(), scratchpad(), 1));
    let bus = session.onewire_bus(BUS_PIN).unwrap();

    let found = bus.discover().unwrap();

    assert_eq!(found.as_slice(), roms.as_slice());
    assert_eq!(bus.session().address, Some([0xFF; 8]));
    assert!(fw.written().contains(&vec![2, 27, BUS_PIN]));
}

#[test]
fn corrupted_rom_fails_discovery() {
    let mut bad = rom(1);
    bad[3] ^= 0x40;
    let (session, _fw) = session_on(ds18b20_bus(vec![bad], scratchpad(), 1));
    let bus = session.onewire_bus(BUS_PIN).unwrap();

    assert!(matches!(
        bus.discover(),
        Err(Error::DeviceFault(DeviceFault::CrcMismatch { .. }))
    ));
}

#[test]
fn addressed_temperature_read() {
    let device = rom(7);
    let (session, fw) = session_on(ds18b20_bus(vec![device], scratchpad(), 1));
    let bus = session.onewire_bus(BUS_PIN).unwrap();
    let before = fw.written_count();

    let celsius = bus.read_temperature(Some(&device)).unwrap();

    assert!((celsius - 25.0625).abs() < f32::EPSILON);
    let mut select = vec![9, 29];
    select.extend_from_slice(&device);
    let written = fw.written_since(before);
    assert_eq!(written[0], vec![1, 28]);
    assert_eq!(written[1], select);
    assert_eq!(written[2], vec![3, 31, 0x44, 1]);
    assert!(written.contains(&vec![3, 31, 0xBE, 0]));
    assert_eq!(written.iter().filter(|f| **f == [1, 32]).count(), 9);
}

#[test]
fn corrupted_scratchpad_is_a_crc_fault() {
    let mut pad = scratchpad();
    pad[0] ^= 0x01;
    let (session, _fw) = session_on(ds18b20_bus(vec![], pad, 1));
    let bus = session.onewire_bus(BUS_PIN).unwrap();

    assert_eq!(
        bus.read_temperature(None),
        Err(Error::DeviceFault(DeviceFault::CrcMismatch {
            expected: pad[8],
            computed: crc8(&pad[..8]),
        }))
    );
}

#[test]
fn empty_bus_has_no_presence_pulse() {
    let (session, _fw) = session_on(ds18b20_bus(vec![], scratchpad(), 0));
    let bus = session.onewire_bus(BUS_PIN).unwrap();

    assert_eq!(
        bus.read_temperature(None),
        Err(Error::DeviceFault(DeviceFault::NoPresencePulse))
    );
}

#[test]
fn firmware_crc_matches_the_local_checksum() {
    let (session, _fw) = session_on(ds18b20_bus(vec![], scratchpad(), 1));
    session.set_pin_mode_one_wire(BUS_PIN).unwrap();
    let (cb, rx) = channel_callback();
    let device = rom(3);

    session.onewire_crc8(&device, cb).unwrap();

    let event = rx
        .recv_timeout(std::time::Duration::from_secs(2))
        .unwrap();
    match event.report {
        telemetrix_esp32::Report::OneWire { subtype, data } => {
            assert_eq!(subtype, 35);
            assert_eq!(data.as_slice(), &[device[7]]);
        }
        other => panic!("unexpected {other:?}"),
    }
}
