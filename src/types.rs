use crate::hw_def::*;

use core::fmt;

#[cfg(feature = "defmt")]
use defmt::Format;

/// Si7021 blocking device driver
#[cfg(feature = "blocking")]
#[derive(Debug)]
pub struct Si7021<I2C, Delay> {
    pub(crate) i2c: I2C,
    pub(crate) delay: Delay,
    pub(crate) state: DriverState,
}

/// Si7021 async device driver
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct Si7021Async<I2C, Delay> {
    pub(crate) i2c: I2C,
    pub(crate) delay: Delay,
    pub(crate) state: DriverState,
}

/// Bookkeeping shared by the blocking and async drivers
#[derive(Debug)]
pub(crate) struct DriverState {
    address: u8,
    capabilities: Capabilities,
    last_measurement_valid: bool,
}
impl DriverState {
    pub(crate) fn new(capabilities: Capabilities) -> Self {
        Self {
            address: DEVICE_ADDRESS,
            capabilities,
            last_measurement_valid: true,
        }
    }
    pub(crate) fn address(&self) -> u8 {
        self.address
    }
    pub(crate) fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
    pub(crate) fn last_measurement_valid(&self) -> bool {
        self.last_measurement_valid
    }
    pub(crate) fn mark_valid(&mut self) {
        self.last_measurement_valid = true;
    }
    /// Number of bytes a humidity/temperature conversion returns
    pub(crate) fn measurement_len(&self) -> usize {
        if self.capabilities.checksum { 3 } else { 2 }
    }
    pub(crate) fn record(&mut self, reading: &RawReading) {
        if self.capabilities.checksum {
            self.last_measurement_valid = reading.is_valid();
        }
    }
}

/// All possible errors in this crate
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, PartialEq)]
pub enum Error<E> {
    /// I²C communication error
    I2c(E),
    /// The user register did not hold its reset default after a reset. Carries the value read.
    UnexpectedConfiguration(u8),
    /// The operation belongs to a capability this driver was built without
    Unsupported,
}

/// Optional driver capabilities, chosen at construction
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capabilities {
    /// serial number and firmware revision readout
    pub device_info: bool,
    /// heater enable and heater power control
    pub heater: bool,
    /// read and verify the checksum byte of each measurement
    pub checksum: bool,
}
impl Default for Capabilities {
    fn default() -> Self {
        Self {
            device_info: true,
            heater: true,
            checksum: true,
        }
    }
}
impl Capabilities {
    /// Measurements and reset only
    pub const fn minimal() -> Self {
        Self {
            device_info: false,
            heater: false,
            checksum: false,
        }
    }
}

/// Raw measurement code as returned by the device
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawReading {
    /// big-endian 16 bit measurement code
    pub code: u16,
    /// checksum byte, if one was read
    pub checksum: Option<u8>,
}
impl RawReading {
    /// Decode the 2 big-endian data bytes and the checksum byte that followed them, if any
    pub fn from_bytes(data: &[u8; 2], checksum: Option<u8>) -> Self {
        Self {
            code: u16::from_be_bytes(*data),
            checksum,
        }
    }
    /// True when no checksum was read or the checksum matches the data
    pub fn is_valid(&self) -> bool {
        match self.checksum {
            Some(crc) => crc == crc8(&self.code.to_be_bytes()),
            None => true,
        }
    }
    /// Get relative humidity in percent
    pub fn humidity_percent(&self) -> f32 {
        raw_rel_humid_to_percent(self.code)
    }
    /// Get temperature in Centigrade
    pub fn centigrade(&self) -> f32 {
        raw_temp_to_centigrade(self.code)
    }
    /// Get temperature in Fahrenheit
    pub fn fahrenheit(&self) -> f32 {
        raw_temp_to_fahrenheit(self.code)
    }
}

/// Relative humidity and the temperature captured alongside it
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// relative humidity in percent
    pub humidity_percent: f32,
    /// degrees centigrade
    pub centigrade: f32,
}

/// Measurement resolution, RH bits / temperature bits
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// 12 bit RH, 14 bit temperature (reset default)
    Rh12Temp14,
    /// 8 bit RH, 12 bit temperature
    Rh8Temp12,
    /// 10 bit RH, 13 bit temperature
    Rh10Temp13,
    /// 11 bit RH, 11 bit temperature
    Rh11Temp11,
}
impl Resolution {
    fn from_bits(res1: bool, res0: bool) -> Self {
        match (res1, res0) {
            (false, false) => Resolution::Rh12Temp14,
            (false, true) => Resolution::Rh8Temp12,
            (true, false) => Resolution::Rh10Temp13,
            (true, true) => Resolution::Rh11Temp11,
        }
    }
    fn bits(self) -> (bool, bool) {
        match self {
            Resolution::Rh12Temp14 => (false, false),
            Resolution::Rh8Temp12 => (false, true),
            Resolution::Rh10Temp13 => (true, false),
            Resolution::Rh11Temp11 => (true, true),
        }
    }
}

fn bit(raw: u8, pos: u8) -> bool {
    raw & (1 << pos) != 0
}

fn with_bit(raw: u8, pos: u8, set: bool) -> u8 {
    if set { raw | (1 << pos) } else { raw & !(1 << pos) }
}

/// RH/T user register 1
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UserRegister(u8);
impl From<u8> for UserRegister {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}
impl UserRegister {
    /// Get the raw register value
    pub fn raw(&self) -> u8 {
        self.0
    }
    /// Measurement resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::from_bits(bit(self.0, USER_REG_BIT_RES1), bit(self.0, USER_REG_BIT_RES0))
    }
    /// Copy of this register with a different resolution; all other bits are kept
    pub fn with_resolution(self, resolution: Resolution) -> Self {
        let (res1, res0) = resolution.bits();
        let raw = with_bit(self.0, USER_REG_BIT_RES1, res1);
        Self(with_bit(raw, USER_REG_BIT_RES0, res0))
    }
    /// On-chip heater is enabled
    pub fn heater_enabled(&self) -> bool {
        bit(self.0, USER_REG_BIT_HTRE)
    }
    /// Copy of this register with the heater bit set or cleared; all other bits are kept
    pub fn with_heater(self, enabled: bool) -> Self {
        Self(with_bit(self.0, USER_REG_BIT_HTRE, enabled))
    }
    /// Supply voltage has dropped below the minimum operating level
    pub fn vdd_low(&self) -> bool {
        bit(self.0, USER_REG_BIT_VDDS)
    }
}
impl fmt::Display for UserRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserRegister {{ 0x{:02x}; {:?} ", self.0, self.resolution())?;
        if self.heater_enabled() {
            write!(f, "heater_enabled ")?;
        }
        if self.vdd_low() {
            write!(f, "vdd_low ")?;
        }
        write!(f, "}}")
    }
}

/// Heater control register
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaterRegister(u8);
impl From<u8> for HeaterRegister {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}
impl HeaterRegister {
    /// Get the raw register value
    pub fn raw(&self) -> u8 {
        self.0
    }
    /// Heater drive level, 0 (about 3 mA) to 15 (about 94 mA)
    pub fn power(&self) -> u8 {
        self.0 & HEATER_REG_MASK_POWER
    }
    /// Copy of this register with a new drive level. Levels above 15 are truncated to their
    /// low 4 bits; the reserved upper bits are kept.
    pub fn with_power(self, level: u8) -> Self {
        Self((self.0 & !HEATER_REG_MASK_POWER) | (level & HEATER_REG_MASK_POWER))
    }
}

/// Electronic serial number of the device
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SerialNumber(pub [u8; 8]);
impl SerialNumber {
    /// Device model encoded in the serial number
    pub fn model(&self) -> DeviceModel {
        DeviceModel::from(self.0[4])
    }
}
impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Device model, as identified by byte 4 of the serial number
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceModel {
    /// Si7013
    Si7013,
    /// Si7020
    Si7020,
    /// Si7021
    Si7021,
    /// engineering sample
    EngineeringSample,
    /// Other
    Other(u8),
}
impl From<u8> for DeviceModel {
    fn from(raw: u8) -> Self {
        match raw {
            DEVICE_ID_SI7013 => DeviceModel::Si7013,
            DEVICE_ID_SI7020 => DeviceModel::Si7020,
            DEVICE_ID_SI7021 => DeviceModel::Si7021,
            DEVICE_ID_ENGINEERING_SAMPLE_0 | DEVICE_ID_ENGINEERING_SAMPLE_1 => DeviceModel::EngineeringSample,
            _ => DeviceModel::Other(raw),
        }
    }
}

/// Firmware revision of the device
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FirmwareRevision {
    /// firmware version 1.0
    V1_0,
    /// firmware version 2.0
    V2_0,
    /// Other
    Other(u8),
}
impl From<u8> for FirmwareRevision {
    fn from(raw: u8) -> Self {
        match raw {
            FIRMWARE_REVISION_1_0 => FirmwareRevision::V1_0,
            FIRMWARE_REVISION_2_0 => FirmwareRevision::V2_0,
            _ => FirmwareRevision::Other(raw),
        }
    }
}
impl From<FirmwareRevision> for u8 {
    fn from(rev: FirmwareRevision) -> u8 {
        match rev {
            FirmwareRevision::V1_0 => FIRMWARE_REVISION_1_0,
            FirmwareRevision::V2_0 => FIRMWARE_REVISION_2_0,
            FirmwareRevision::Other(raw) => raw,
        }
    }
}
impl fmt::Display for FirmwareRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw: u8 = (*self).into();
        match self {
            FirmwareRevision::V1_0 => write!(f, "1.0 (0x{raw:02X})"),
            FirmwareRevision::V2_0 => write!(f, "2.0 (0x{raw:02X})"),
            FirmwareRevision::Other(_) => write!(f, "Unknown (0x{raw:02X})"),
        }
    }
}

/// Serial number and firmware revision
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceInfo {
    /// electronic serial number
    pub serial: SerialNumber,
    /// firmware revision
    pub firmware_revision: FirmwareRevision,
}

/// Keep the data bytes of an electronic ID response, which alternates data and checksum bytes
pub(crate) fn serial_half(response: &[u8; 8]) -> [u8; 4] {
    [response[0], response[2], response[4], response[6]]
}
