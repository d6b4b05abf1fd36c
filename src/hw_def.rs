//! Wire-level definitions for the Si7021: bus address, command opcodes, register bit layout,
//! timing, checksum and unit conversions.

use crc::{Algorithm, Crc};

#[cfg(feature = "defmt")]
use defmt::Format;

/// 7-bit bus address of the Si7021. The device does not support any other address.
pub const DEVICE_ADDRESS: u8 = 0x40;

/// Value of the user register after power-up or a software reset
pub const DEFAULT_USER_REGISTER: u8 = 0x3A;

/// Time the device needs to finish a humidity or temperature conversion
pub const CONVERSION_DELAY_MS: u32 = 25;

/// Time the device needs to come back up after a software reset
pub const RESET_DELAY_MS: u32 = 50;

// User register bit positions
pub(crate) const USER_REG_BIT_RES0: u8 = 0;
pub(crate) const USER_REG_BIT_HTRE: u8 = 2;
pub(crate) const USER_REG_BIT_VDDS: u8 = 6;
pub(crate) const USER_REG_BIT_RES1: u8 = 7;

// Heater control register
pub(crate) const HEATER_REG_MASK_POWER: u8 = 0x0F;

// Firmware revision codes
pub(crate) const FIRMWARE_REVISION_1_0: u8 = 0xFF;
pub(crate) const FIRMWARE_REVISION_2_0: u8 = 0x20;

// Device identification byte (SNB_3, byte 4 of the serial number)
pub(crate) const DEVICE_ID_ENGINEERING_SAMPLE_0: u8 = 0x00;
pub(crate) const DEVICE_ID_ENGINEERING_SAMPLE_1: u8 = 0xFF;
pub(crate) const DEVICE_ID_SI7013: u8 = 0x0D;
pub(crate) const DEVICE_ID_SI7020: u8 = 0x14;
pub(crate) const DEVICE_ID_SI7021: u8 = 0x15;

/// Commands understood by the device
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    /// Measure relative humidity, no hold master mode
    MeasureRelHumidNoHold,
    /// Measure temperature, no hold master mode
    MeasureTempNoHold,
    /// Read the temperature captured by the previous humidity measurement
    ReadPrevTemp,
    /// Software reset
    Reset,
    /// Write RH/T user register 1
    WriteUserReg,
    /// Read RH/T user register 1
    ReadUserReg,
    /// Write heater control register
    WriteHeaterReg,
    /// Read heater control register
    ReadHeaterReg,
    /// Read electronic ID, first half
    ReadSerialA,
    /// Read electronic ID, second half
    ReadSerialB,
    /// Read firmware revision
    ReadFirmwareRev,
}

impl Command {
    /// Opcode bytes as they go out on the wire
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Command::MeasureRelHumidNoHold => &[0xF5],
            Command::MeasureTempNoHold => &[0xF3],
            Command::ReadPrevTemp => &[0xE0],
            Command::Reset => &[0xFE],
            Command::WriteUserReg => &[0xE6],
            Command::ReadUserReg => &[0xE7],
            Command::WriteHeaterReg => &[0x51],
            Command::ReadHeaterReg => &[0x11],
            Command::ReadSerialA => &[0xFA, 0x0F],
            Command::ReadSerialB => &[0xFC, 0xC9],
            Command::ReadFirmwareRev => &[0x84, 0xB8],
        }
    }

    /// Minimum wait between sending the command and reading its response
    pub const fn settle_ms(self) -> u32 {
        match self {
            Command::MeasureRelHumidNoHold | Command::MeasureTempNoHold => CONVERSION_DELAY_MS,
            Command::Reset => RESET_DELAY_MS,
            _ => 0,
        }
    }
}

/// CRC-8 used by the Si70xx family: x^8 + x^5 + x^4 + 1, MSB first, initial value 0.
pub const CRC_8_SI70XX: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x31,
    init: 0x00,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0xA2,
    residue: 0x00,
};

const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_SI70XX);

/// Checksum the device appends to measurement data
pub fn crc8(data: &[u8]) -> u8 {
    CRC.checksum(data)
}

/// Convert a raw humidity code to relative humidity in percent, clamped to `0.0..=100.0`
pub fn raw_rel_humid_to_percent(raw: u16) -> f32 {
    let humidity = (raw as f32) * 125.0 / 65536.0 - 6.0;
    // the linear transfer function overshoots slightly at both ends
    humidity.clamp(0.0, 100.0)
}

/// Convert a raw temperature code to degrees centigrade
pub fn raw_temp_to_centigrade(raw: u16) -> f32 {
    ((raw as f64) * 175.72 / 65536.0 - 46.85) as f32
}

/// Convert a raw temperature code to degrees fahrenheit
pub fn raw_temp_to_fahrenheit(raw: u16) -> f32 {
    raw_temp_to_centigrade(raw) * 1.8 + 32.0
}
