use crate::hw_def::*;
use crate::types::*;

use embedded_hal::{delay::DelayNs, i2c::I2c};

impl<I2C, Delay, E> Si7021<I2C, Delay>
where
    I2C: I2c<Error = E>,
    Delay: DelayNs,
{
    /// Create a new Si7021 driver instance with every capability enabled
    pub fn new(i2c: I2C, delay: Delay) -> Self {
        Self::with_capabilities(i2c, delay, Capabilities::default())
    }

    /// Create a new Si7021 driver instance with a chosen set of capabilities
    pub fn with_capabilities(i2c: I2C, delay: Delay, capabilities: Capabilities) -> Self {
        Self { i2c, delay, state: DriverState::new(capabilities) }
    }

    /// Release the bus and delay
    pub fn destroy(self) -> (I2C, Delay) {
        (self.i2c, self.delay)
    }

    /// Bus address of the device
    pub fn address(&self) -> u8 {
        self.state.address()
    }

    /// Capabilities this driver was created with
    pub fn capabilities(&self) -> Capabilities {
        self.state.capabilities()
    }

    /// Whether the checksum of the last humidity or temperature measurement matched.
    /// Always true when the checksum capability is disabled.
    pub fn last_measurement_valid(&self) -> bool {
        self.state.last_measurement_valid()
    }

    fn require(&self, enabled: bool) -> Result<(), Error<E>> {
        if enabled { Ok(()) } else { Err(Error::Unsupported) }
    }

    fn transact(&mut self, cmd_bytes: &[u8], read_buf: &mut [u8], settle_ms: u32) -> Result<(), Error<E>> {
        let addr = self.state.address();
        trace!("si7021::transact(): cmd={:?} read_len={} settle_ms={}", cmd_bytes, read_buf.len(), settle_ms);
        if read_buf.is_empty() {
            self.i2c.write(addr, cmd_bytes).map_err(Error::I2c)?;
        } else if settle_ms > 0 {
            self.i2c.write(addr, cmd_bytes).map_err(Error::I2c)?;
            self.delay.delay_ms(settle_ms);
            self.i2c.read(addr, read_buf).map_err(Error::I2c)?;
        } else {
            self.i2c.write_read(addr, cmd_bytes, read_buf).map_err(Error::I2c)?;
        }
        Ok(())
    }

    fn cmd_and_read(&mut self, cmd: Command, read_buf: &mut [u8]) -> Result<(), Error<E>> {
        self.transact(cmd.as_bytes(), read_buf, cmd.settle_ms())
    }

    fn cmd_and_write(&mut self, cmd: Command, value: u8) -> Result<(), Error<E>> {
        let cmd_bytes = [cmd.as_bytes()[0], value];
        self.transact(&cmd_bytes, &mut [], 0)
    }

    fn measure_raw(&mut self, cmd: Command) -> Result<RawReading, Error<E>> {
        let len = self.state.measurement_len();
        let mut read_buf = [0u8; 3];
        self.cmd_and_read(cmd, &mut read_buf[..len])?;
        let checksum = if len == 3 { Some(read_buf[2]) } else { None };
        let reading = RawReading::from_bytes(&[read_buf[0], read_buf[1]], checksum);
        self.state.record(&reading);
        if !reading.is_valid() {
            warn!("si7021::measure_raw(): crc mismatch: read_buf={:?}", &read_buf[..len]);
        }
        Ok(reading)
    }

    /// Software reset. Waits for the device to come back up even when the command was not
    /// acknowledged.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        let result = self.i2c.write(self.state.address(), Command::Reset.as_bytes());
        self.delay.delay_ms(Command::Reset.settle_ms());
        debug!("si7021::reset(): acknowledged={}", result.is_ok());
        result.map_err(Error::I2c)
    }

    /// Reset the device and check that it came up with its default configuration
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        self.reset()?;
        let reg = self.read_user_register()?;
        if reg.raw() != DEFAULT_USER_REGISTER {
            warn!("si7021::begin(): unexpected user register 0x{:x}", reg.raw());
            return Err(Error::UnexpectedConfiguration(reg.raw()));
        }
        self.state.mark_valid();
        Ok(())
    }

    /// Measure relative humidity in percent, clamped to 0..=100
    pub fn read_humidity(&mut self) -> Result<f32, Error<E>> {
        Ok(self.measure_raw(Command::MeasureRelHumidNoHold)?.humidity_percent())
    }

    /// Measure temperature in degrees centigrade
    pub fn read_temperature(&mut self) -> Result<f32, Error<E>> {
        Ok(self.measure_raw(Command::MeasureTempNoHold)?.centigrade())
    }

    /// Temperature captured by the last humidity measurement, in degrees centigrade
    pub fn read_last_temperature(&mut self) -> Result<f32, Error<E>> {
        let mut read_buf = [0u8; 2];
        self.cmd_and_read(Command::ReadPrevTemp, &mut read_buf)?;
        Ok(RawReading::from_bytes(&read_buf, None).centigrade())
    }

    /// Measure humidity and fetch the temperature taken with it
    pub fn measure(&mut self) -> Result<Measurement, Error<E>> {
        let humidity_percent = self.read_humidity()?;
        let centigrade = self.read_last_temperature()?;
        Ok(Measurement { humidity_percent, centigrade })
    }

    /// Read RH/T user register 1
    pub fn read_user_register(&mut self) -> Result<UserRegister, Error<E>> {
        let mut read_buf = [0u8; 1];
        self.cmd_and_read(Command::ReadUserReg, &mut read_buf)?;
        Ok(UserRegister::from(read_buf[0]))
    }

    /// Write RH/T user register 1
    pub fn write_user_register(&mut self, reg: UserRegister) -> Result<(), Error<E>> {
        debug!("si7021::write_user_register(): 0x{:x}", reg.raw());
        self.cmd_and_write(Command::WriteUserReg, reg.raw())
    }

    /// Change measurement resolution
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        let reg = self.read_user_register()?;
        self.write_user_register(reg.with_resolution(resolution))
    }

    /// Turn the on-chip heater on or off
    pub fn set_heater_enabled(&mut self, enabled: bool) -> Result<(), Error<E>> {
        self.require(self.state.capabilities().heater)?;
        let reg = self.read_user_register()?;
        self.write_user_register(reg.with_heater(enabled))
    }

    /// Read the heater control register
    pub fn read_heater_register(&mut self) -> Result<HeaterRegister, Error<E>> {
        self.require(self.state.capabilities().heater)?;
        let mut read_buf = [0u8; 1];
        self.cmd_and_read(Command::ReadHeaterReg, &mut read_buf)?;
        Ok(HeaterRegister::from(read_buf[0]))
    }

    /// Set heater drive level (0..=15, higher values are truncated to the low 4 bits).
    /// Does not turn the heater on.
    pub fn set_heater_power(&mut self, level: u8) -> Result<(), Error<E>> {
        let reg = self.read_heater_register()?.with_power(level);
        debug!("si7021::set_heater_power(): 0x{:x}", reg.raw());
        self.cmd_and_write(Command::WriteHeaterReg, reg.raw())
    }

    /// Read the electronic serial number and firmware revision
    pub fn read_device_info(&mut self) -> Result<DeviceInfo, Error<E>> {
        self.require(self.state.capabilities().device_info)?;
        let mut read_buf = [0u8; 8];
        let mut serial = [0u8; 8];
        self.cmd_and_read(Command::ReadSerialA, &mut read_buf)?;
        serial[0..4].copy_from_slice(&serial_half(&read_buf));
        self.cmd_and_read(Command::ReadSerialB, &mut read_buf)?;
        serial[4..8].copy_from_slice(&serial_half(&read_buf));

        let mut rev_buf = [0u8; 1];
        self.cmd_and_read(Command::ReadFirmwareRev, &mut rev_buf)?;
        Ok(DeviceInfo {
            serial: SerialNumber(serial),
            firmware_revision: FirmwareRevision::from(rev_buf[0]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::vec;

    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    const ADDR: u8 = DEVICE_ADDRESS;

    /// Sums up every requested delay
    #[derive(Debug, Default)]
    struct RecordingDelay {
        total_ns: u64,
    }
    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    /// Register-level stand-in for the device
    #[derive(Debug)]
    struct FakeSi7021 {
        user_reg: u8,
        heater_reg: u8,
        last_cmd: u8,
    }
    impl FakeSi7021 {
        fn new(user_reg: u8, heater_reg: u8) -> Self {
            Self { user_reg, heater_reg, last_cmd: 0 }
        }
    }
    impl ErrorType for FakeSi7021 {
        type Error = ErrorKind;
    }
    impl I2c for FakeSi7021 {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
            if address != ADDR {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => match bytes {
                        [0xE6, value] => self.user_reg = *value,
                        [0x51, value] => self.heater_reg = *value,
                        [0xFE] => {
                            self.user_reg = DEFAULT_USER_REGISTER;
                            self.heater_reg = 0x00;
                        }
                        [cmd, ..] => self.last_cmd = *cmd,
                        [] => return Err(ErrorKind::Other),
                    },
                    Operation::Read(buf) => match self.last_cmd {
                        0xE7 => buf[0] = self.user_reg,
                        0x11 => buf[0] = self.heater_reg,
                        _ => return Err(ErrorKind::Other),
                    },
                }
            }
            Ok(())
        }
    }

    fn nack() -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }

    #[test]
    fn read_humidity_with_checksum() {
        let expectations = [
            Transaction::write(ADDR, vec![0xF5]),
            Transaction::read(ADDR, vec![0x4E, 0x85, 0x6B]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), RecordingDelay::default());

        let humidity = si7021.read_humidity().unwrap();
        assert!((humidity - 32.3396).abs() < 1e-3);
        assert!(si7021.last_measurement_valid());

        let (_, delay) = si7021.destroy();
        assert_eq!(delay.total_ns, 25_000_000);
        i2c.done();
    }

    #[test]
    fn humidity_is_clamped() {
        let expectations = [
            Transaction::write(ADDR, vec![0xF5]),
            Transaction::read(ADDR, vec![0xFF, 0xFF, crc8(&[0xFF, 0xFF])]),
            Transaction::write(ADDR, vec![0xF5]),
            Transaction::read(ADDR, vec![0x00, 0x00, 0x00]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        assert_eq!(si7021.read_humidity().unwrap(), 100.0);
        assert_eq!(si7021.read_humidity().unwrap(), 0.0);
        i2c.done();
    }

    #[test]
    fn checksum_mismatch_only_flags_the_reading() {
        let expectations = [
            Transaction::write(ADDR, vec![0xF3]),
            Transaction::read(ADDR, vec![0x68, 0x3A, 0x00]),
            Transaction::write(ADDR, vec![0xF3]),
            Transaction::read(ADDR, vec![0x68, 0x3A, 0x7C]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        let temperature = si7021.read_temperature().unwrap();
        assert!((temperature - 24.6918).abs() < 1e-3);
        assert!(!si7021.last_measurement_valid());

        si7021.read_temperature().unwrap();
        assert!(si7021.last_measurement_valid());
        i2c.done();
    }

    #[test]
    fn measurement_without_checksum_reads_two_bytes() {
        let expectations = [
            Transaction::write(ADDR, vec![0xF3]),
            Transaction::read(ADDR, vec![0x00, 0x00]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::with_capabilities(i2c.clone(), NoopDelay::new(), Capabilities::minimal());

        assert_eq!(si7021.read_temperature().unwrap(), -46.85);
        assert!(si7021.last_measurement_valid());
        i2c.done();
    }

    #[test]
    fn read_last_temperature_uses_held_transmission() {
        let expectations = [Transaction::write_read(ADDR, vec![0xE0], vec![0x70, 0xF0])];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), RecordingDelay::default());

        let expected = (0x70F0 as f64 * 175.72 / 65536.0 - 46.85) as f32;
        assert_eq!(si7021.read_last_temperature().unwrap().to_bits(), expected.to_bits());

        let (_, delay) = si7021.destroy();
        assert_eq!(delay.total_ns, 0);
        i2c.done();
    }

    #[test]
    fn measure_pairs_humidity_with_last_temperature() {
        let expectations = [
            Transaction::write(ADDR, vec![0xF5]),
            Transaction::read(ADDR, vec![0x4E, 0x85, 0x6B]),
            Transaction::write_read(ADDR, vec![0xE0], vec![0x68, 0x3A]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        let measurement = si7021.measure().unwrap();
        assert!((measurement.humidity_percent - 32.3396).abs() < 1e-3);
        assert!((measurement.centigrade - 24.6918).abs() < 1e-3);
        i2c.done();
    }

    #[test]
    fn measurement_write_failure_is_reported() {
        let expectations = [Transaction::write(ADDR, vec![0xF5]).with_error(nack())];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        assert_eq!(si7021.read_humidity(), Err(Error::I2c(nack())));
        i2c.done();
    }

    #[test]
    fn reset_waits_even_without_ack() {
        let expectations = [Transaction::write(ADDR, vec![0xFE]).with_error(nack())];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), RecordingDelay::default());

        assert_eq!(si7021.reset(), Err(Error::I2c(nack())));
        let (_, delay) = si7021.destroy();
        assert_eq!(delay.total_ns, 50_000_000);
        i2c.done();
    }

    #[test]
    fn begin_accepts_default_configuration() {
        let expectations = [
            Transaction::write(ADDR, vec![0xFE]),
            Transaction::write_read(ADDR, vec![0xE7], vec![0x3A]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        assert_eq!(si7021.begin(), Ok(()));
        assert!(si7021.last_measurement_valid());
        i2c.done();
    }

    #[test]
    fn begin_rejects_unexpected_configuration() {
        let expectations = [
            Transaction::write(ADDR, vec![0xFE]),
            Transaction::write_read(ADDR, vec![0xE7], vec![0x3B]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        assert_eq!(si7021.begin(), Err(Error::UnexpectedConfiguration(0x3B)));
        i2c.done();
    }

    #[test]
    fn begin_stops_when_reset_fails() {
        let expectations = [Transaction::write(ADDR, vec![0xFE]).with_error(nack())];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        assert_eq!(si7021.begin(), Err(Error::I2c(nack())));
        i2c.done();
    }

    #[test]
    fn read_device_info_drops_interleaved_checksums() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0xFA, 0x0F], vec![0x45, 0xA1, 0xDB, 0xA2, 0x52, 0xA3, 0x49, 0xA4]),
            Transaction::write_read(ADDR, vec![0xFC, 0xC9], vec![0x15, 0xB1, 0xB5, 0xB2, 0xFF, 0xB3, 0xFF, 0xB4]),
            Transaction::write_read(ADDR, vec![0x84, 0xB8], vec![0x20]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        let info = si7021.read_device_info().unwrap();
        assert_eq!(info.serial, SerialNumber([0x45, 0xDB, 0x52, 0x49, 0x15, 0xB5, 0xFF, 0xFF]));
        assert_eq!(info.serial.model(), DeviceModel::Si7021);
        assert_eq!(info.firmware_revision, FirmwareRevision::V2_0);
        i2c.done();
    }

    #[test]
    fn disabled_capabilities_do_not_touch_the_bus() {
        let mut i2c = I2cMock::new(&[]);
        let mut si7021 = Si7021::with_capabilities(i2c.clone(), NoopDelay::new(), Capabilities::minimal());

        assert_eq!(si7021.read_device_info(), Err(Error::Unsupported));
        assert_eq!(si7021.set_heater_enabled(true), Err(Error::Unsupported));
        assert_eq!(si7021.set_heater_power(3), Err(Error::Unsupported));
        i2c.done();
    }

    #[test]
    fn set_heater_power_wire_sequence() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x11], vec![0xA3]),
            Transaction::write(ADDR, vec![0x51, 0xAF]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut si7021 = Si7021::new(i2c.clone(), NoopDelay::new());

        si7021.set_heater_power(0x1F).unwrap();
        i2c.done();
    }

    #[test]
    fn heater_power_preserves_reserved_bits() {
        let mut si7021 = Si7021::new(FakeSi7021::new(DEFAULT_USER_REGISTER, 0xA3), NoopDelay::new());

        si7021.set_heater_power(0x1F).unwrap();
        assert_eq!(si7021.read_heater_register().unwrap().raw(), 0xAF);
        si7021.set_heater_power(0x02).unwrap();
        assert_eq!(si7021.read_heater_register().unwrap().raw(), 0xA2);
        // power alone does not turn the heater on
        assert!(!si7021.read_user_register().unwrap().heater_enabled());
    }

    #[test]
    fn heater_toggle_restores_user_register() {
        let mut si7021 = Si7021::new(FakeSi7021::new(0xBB, 0x00), NoopDelay::new());

        si7021.set_heater_enabled(true).unwrap();
        assert_eq!(si7021.read_user_register().unwrap().raw(), 0xBF);
        si7021.set_heater_enabled(false).unwrap();
        assert_eq!(si7021.read_user_register().unwrap().raw(), 0xBB);
    }

    #[test]
    fn user_register_round_trip() {
        let mut si7021 = Si7021::new(FakeSi7021::new(DEFAULT_USER_REGISTER, 0x00), NoopDelay::new());

        for value in [0x00, 0x3A, 0x81, 0xFF] {
            si7021.write_user_register(UserRegister::from(value)).unwrap();
            assert_eq!(si7021.read_user_register().unwrap().raw(), value);
        }
    }

    #[test]
    fn set_resolution_keeps_other_bits() {
        let mut si7021 = Si7021::new(FakeSi7021::new(0x3E, 0x00), NoopDelay::new());

        si7021.set_resolution(Resolution::Rh8Temp12).unwrap();
        let reg = si7021.read_user_register().unwrap();
        assert_eq!(reg.raw(), 0x3F);
        assert_eq!(reg.resolution(), Resolution::Rh8Temp12);
        assert!(reg.heater_enabled());
    }

    #[test]
    fn begin_after_reset_on_fake_device() {
        let mut si7021 = Si7021::new(FakeSi7021::new(0xFF, 0xFF), NoopDelay::new());

        assert_eq!(si7021.begin(), Ok(()));
        assert_eq!(si7021.read_heater_register().unwrap().power(), 0);
    }
}
