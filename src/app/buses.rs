//! Bus commands: I2C, SPI and the OneWire primitives.
//!
//! Each bus has an init call that must come first; everything else fails
//! with `NotEnabled` until it has been made. A bus has a single report
//! owner, so a read request replaces the previous callback.

use heapless::Vec;
use log::info;

use super::ports::OneWireLink;
use super::session::Session;
use crate::device::onewire::OneWireBus;
use crate::device::registry::{Callback, DeviceKey, MAX_CS_PINS, Registry};
use crate::error::{Error, Result};
use crate::pins::PinFamily;
use crate::protocol::codec::MAX_BODY_LEN;
use crate::protocol::opcodes::Opcode;

/// Room for a length prefix, the opcode and payload bytes.
type Args = Vec<u8, MAX_BODY_LEN>;

/// `[len(data), header.., data..]`
fn counted(header: &[u8], data: &[u8]) -> Result<Args> {
    let too_long = Error::InvalidRange {
        field: "payload length",
        value: data.len() as i64,
    };
    let count = u8::try_from(data.len()).map_err(|_| too_long)?;
    let mut args = Args::new();
    args.push(count).map_err(|_| too_long)?;
    args.extend_from_slice(header).map_err(|()| too_long)?;
    args.extend_from_slice(data).map_err(|()| too_long)?;
    Ok(args)
}

impl Session {
    // ── I2C ───────────────────────────────────────────────────

    /// I2C_BEGIN on the standard pins (SDA 21, SCL 22). Repeated calls
    /// are no-ops.
    pub fn set_pin_mode_i2c(&self) -> Result<()> {
        {
            let mut registry = self.dispatcher().registry();
            if registry.buses.i2c {
                return Ok(());
            }
            registry.buses.i2c = true;
        }
        self.send(Opcode::I2cBegin, &[])
    }

    /// Read `count` bytes from `register` (0 when `None`), then stop.
    pub fn i2c_read(
        &self,
        address: u8,
        register: Option<u8>,
        count: u8,
        callback: Callback,
    ) -> Result<()> {
        self.i2c_read_request(address, register, count, true, callback)
    }

    /// As [`i2c_read`](Self::i2c_read) but with a repeated start instead of
    /// a stop, for devices such as the MMA8452Q.
    pub fn i2c_read_restart_transmission(
        &self,
        address: u8,
        register: Option<u8>,
        count: u8,
        callback: Callback,
    ) -> Result<()> {
        self.i2c_read_request(address, register, count, false, callback)
    }

    fn i2c_read_request(
        &self,
        address: u8,
        register: Option<u8>,
        count: u8,
        stop: bool,
        callback: Callback,
    ) -> Result<()> {
        self.checked(|| {
            {
                let mut registry = self.dispatcher().registry();
                registry.require_i2c()?;
                registry.register(DeviceKey::I2c, callback);
            }
            self.send(
                Opcode::I2cRead,
                &[address, register.unwrap_or(0), count, u8::from(stop)],
            )
        })
    }

    pub fn i2c_write(&self, address: u8, data: &[u8]) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().require_i2c()?;
            let args = counted(&[address], data)?;
            self.send(Opcode::I2cWrite, &args)
        })
    }

    // ── SPI ───────────────────────────────────────────────────

    /// SPI_INIT on the VSPI pins (MOSI 23, MISO 19, SCK 18) with the given
    /// chip-select pins, which the firmware drives high.
    pub fn set_pin_mode_spi(&self, chip_selects: &[u8]) -> Result<()> {
        self.checked(|| {
            if chip_selects.is_empty() || chip_selects.len() > MAX_CS_PINS {
                return Err(Error::InvalidRange {
                    field: "chip select count",
                    value: chip_selects.len() as i64,
                });
            }
            for &pin in chip_selects {
                Registry::require_pin(pin, PinFamily::DigitalOutput)?;
            }
            {
                let mut registry = self.dispatcher().registry();
                registry.buses.spi = true;
                for &pin in chip_selects {
                    if !registry.buses.cs_pins.contains(&pin) {
                        // capacity checked above
                        let _ = registry.buses.cs_pins.push(pin);
                    }
                }
            }
            let args = counted(&[], chip_selects)?;
            self.send(Opcode::SpiInit, &args)
        })
    }

    /// Drive a chip-select line: `select` true pulls it low.
    pub fn spi_cs_control(&self, pin: u8, select: bool) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().require_chip_select(pin)?;
            self.send(Opcode::SpiCsControl, &[pin, u8::from(!select)])
        })
    }

    pub fn spi_read_blocking(&self, register: u8, count: u8, callback: Callback) -> Result<()> {
        self.checked(|| {
            {
                let mut registry = self.dispatcher().registry();
                registry.require_spi()?;
                registry.register(DeviceKey::Spi, callback);
            }
            self.send(Opcode::SpiReadBlocking, &[count, register])
        })
    }

    pub fn spi_write_blocking(&self, data: &[u8]) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().require_spi()?;
            let args = counted(&[], data)?;
            self.send(Opcode::SpiWriteBlocking, &args)
        })
    }

    /// `bit_order`: 0 LSB first, 1 MSB first. `data_mode`: one of the
    /// Arduino `SPI_MODEn` values (0x00, 0x04, 0x08, 0x0C).
    pub fn spi_set_format(&self, clock_divisor: u8, bit_order: u8, data_mode: u8) -> Result<()> {
        self.checked(|| {
            self.dispatcher().registry().require_spi()?;
            if bit_order > 1 {
                return Err(Error::InvalidRange {
                    field: "SPI bit order",
                    value: i64::from(bit_order),
                });
            }
            if !matches!(data_mode, 0x00 | 0x04 | 0x08 | 0x0C) {
                return Err(Error::InvalidRange {
                    field: "SPI data mode",
                    value: i64::from(data_mode),
                });
            }
            self.send(Opcode::SpiSetFormat, &[clock_divisor, bit_order, data_mode])
        })
    }

    // ── OneWire primitives ────────────────────────────────────

    pub fn set_pin_mode_one_wire(&self, pin: u8) -> Result<()> {
        self.checked(|| {
            Registry::require_pin(pin, PinFamily::DigitalInput)?;
            self.dispatcher().registry().buses.onewire = true;
            self.send(Opcode::OneWireInit, &[pin])
        })
    }

    /// Reset pulse; the callback gets the presence result.
    pub fn onewire_reset(&self, callback: Callback) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireReset, &[], Some(callback)))
    }

    pub fn onewire_select(&self, address: &[u8]) -> Result<()> {
        self.checked(|| {
            if address.len() != 8 {
                return Err(Error::InvalidRange {
                    field: "OneWire address length",
                    value: address.len() as i64,
                });
            }
            self.onewire_send(Opcode::OneWireSelect, address, None)
        })
    }

    pub fn onewire_skip(&self) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireSkip, &[], None))
    }

    /// Write one byte. With `power` the bus is held high afterwards for
    /// parasite-powered devices.
    pub fn onewire_write(&self, data: u8, power: bool) -> Result<()> {
        self.checked(|| {
            if data == 0 || data == u8::MAX {
                return Err(Error::InvalidRange {
                    field: "OneWire write data",
                    value: i64::from(data),
                });
            }
            self.onewire_send(Opcode::OneWireWrite, &[data, u8::from(power)], None)
        })
    }

    pub fn onewire_read(&self, callback: Callback) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireRead, &[], Some(callback)))
    }

    pub fn onewire_reset_search(&self) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireResetSearch, &[], None))
    }

    /// Next device address, all 0xFF once the bus is exhausted.
    pub fn onewire_search(&self, callback: Callback) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireSearch, &[], Some(callback)))
    }

    /// Firmware-side CRC-8 over all but the last byte of `bytes`.
    pub fn onewire_crc8(&self, bytes: &[u8], callback: Callback) -> Result<()> {
        self.checked(|| self.onewire_crc8_send(bytes, Some(callback)))
    }

    /// `[len - 1, bytes..]`: the firmware checksums the first `len - 1`
    /// bytes so the caller can compare against the last one.
    fn onewire_crc8_send(&self, bytes: &[u8], callback: Option<Callback>) -> Result<()> {
        let bad_len = Error::InvalidRange {
            field: "OneWire CRC length",
            value: bytes.len() as i64,
        };
        let covered = bytes
            .len()
            .checked_sub(1)
            .and_then(|n| u8::try_from(n).ok())
            .ok_or(bad_len)?;
        let mut args = Args::new();
        args.push(covered).map_err(|_| bad_len)?;
        args.extend_from_slice(bytes).map_err(|()| bad_len)?;
        self.onewire_send(Opcode::OneWireCrc8, &args, callback)
    }

    fn onewire_send(&self, opcode: Opcode, args: &[u8], callback: Option<Callback>) -> Result<()> {
        {
            let mut registry = self.dispatcher().registry();
            registry.require_onewire()?;
            if let Some(cb) = callback {
                registry.register(DeviceKey::OneWire, cb);
            }
        }
        self.send(opcode, args)
    }

    /// Initialise OneWire on `pin` and hand back a bus controller that owns
    /// its reports.
    pub fn onewire_bus(&self, pin: u8) -> Result<OneWireBus<'_, Self>> {
        let config = self.config();
        OneWireBus::attach(
            self,
            pin,
            config.onewire_reply_timeout(),
            config.onewire_conversion(),
        )
    }
}

impl OneWireLink for Session {
    fn attach(&self, pin: u8, router: Callback) -> Result<()> {
        self.set_pin_mode_one_wire(pin)?;
        self.dispatcher()
            .registry()
            .register(DeviceKey::OneWire, router);
        info!("onewire: router installed for GPIO {pin}");
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireReset, &[], None))
    }

    fn select(&self, address: &[u8; 8]) -> Result<()> {
        self.onewire_select(address)
    }

    fn skip(&self) -> Result<()> {
        self.onewire_skip()
    }

    fn write(&self, data: u8, power: bool) -> Result<()> {
        self.onewire_write(data, power)
    }

    fn read(&self) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireRead, &[], None))
    }

    fn reset_search(&self) -> Result<()> {
        self.onewire_reset_search()
    }

    fn search(&self) -> Result<()> {
        self.checked(|| self.onewire_send(Opcode::OneWireSearch, &[], None))
    }

    fn crc8(&self, bytes: &[u8]) -> Result<()> {
        self.checked(|| self.onewire_crc8_send(bytes, None))
    }
}
