use crate::hw_def::*;
use crate::types::*;

use embedded_hal_async::{delay::DelayNs, i2c::I2c};

impl<I2C, Delay, E> Si7021Async<I2C, Delay>
where
    I2C: I2c<Error = E>,
    Delay: DelayNs,
{
    /// Create a new async Si7021 driver instance with every capability enabled
    pub fn new(i2c: I2C, delay: Delay) -> Self {
        Self::with_capabilities(i2c, delay, Capabilities::default())
    }

    /// Create a new async Si7021 driver instance with a chosen set of capabilities
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

    async fn transact(&mut self, cmd_bytes: &[u8], read_buf: &mut [u8], settle_ms: u32) -> Result<(), Error<E>> {
        let addr = self.state.address();
        trace!("si7021_async::transact(): cmd={:?} read_len={} settle_ms={}", cmd_bytes, read_buf.len(), settle_ms);
        if read_buf.is_empty() {
            self.i2c.write(addr, cmd_bytes).await.map_err(Error::I2c)?;
        } else if settle_ms > 0 {
            self.i2c.write(addr, cmd_bytes).await.map_err(Error::I2c)?;
            self.delay.delay_ms(settle_ms).await;
            self.i2c.read(addr, read_buf).await.map_err(Error::I2c)?;
        } else {
            self.i2c.write_read(addr, cmd_bytes, read_buf).await.map_err(Error::I2c)?;
        }
        Ok(())
    }

    async fn cmd_and_read(&mut self, cmd: Command, read_buf: &mut [u8]) -> Result<(), Error<E>> {
        self.transact(cmd.as_bytes(), read_buf, cmd.settle_ms()).await
    }

    async fn cmd_and_write(&mut self, cmd: Command, value: u8) -> Result<(), Error<E>> {
        let cmd_bytes = [cmd.as_bytes()[0], value];
        self.transact(&cmd_bytes, &mut [], 0).await
    }

    async fn measure_raw(&mut self, cmd: Command) -> Result<RawReading, Error<E>> {
        let len = self.state.measurement_len();
        let mut read_buf = [0u8; 3];
        self.cmd_and_read(cmd, &mut read_buf[..len]).await?;
        let checksum = if len == 3 { Some(read_buf[2]) } else { None };
        let reading = RawReading::from_bytes(&[read_buf[0], read_buf[1]], checksum);
        self.state.record(&reading);
        if !reading.is_valid() {
            warn!("si7021_async::measure_raw(): crc mismatch: read_buf={:?}", &read_buf[..len]);
        }
        Ok(reading)
    }

    /// Software reset. Waits for the device to come back up even when the command was not
    /// acknowledged.
    pub async fn reset(&mut self) -> Result<(), Error<E>> {
        let result = self.i2c.write(self.state.address(), Command::Reset.as_bytes()).await;
        self.delay.delay_ms(Command::Reset.settle_ms()).await;
        debug!("si7021_async::reset(): acknowledged={}", result.is_ok());
        result.map_err(Error::I2c)
    }

    /// Reset the device and check that it came up with its default configuration
    pub async fn begin(&mut self) -> Result<(), Error<E>> {
        self.reset().await?;
        let reg = self.read_user_register().await?;
        if reg.raw() != DEFAULT_USER_REGISTER {
            warn!("si7021_async::begin(): unexpected user register 0x{:x}", reg.raw());
            return Err(Error::UnexpectedConfiguration(reg.raw()));
        }
        self.state.mark_valid();
        Ok(())
    }

    /// Measure relative humidity in percent, clamped to 0..=100
    pub async fn read_humidity(&mut self) -> Result<f32, Error<E>> {
        Ok(self.measure_raw(Command::MeasureRelHumidNoHold).await?.humidity_percent())
    }

    /// Measure temperature in degrees centigrade
    pub async fn read_temperature(&mut self) -> Result<f32, Error<E>> {
        Ok(self.measure_raw(Command::MeasureTempNoHold).await?.centigrade())
    }

    /// Temperature captured by the last humidity measurement, in degrees centigrade
    pub async fn read_last_temperature(&mut self) -> Result<f32, Error<E>> {
        let mut read_buf = [0u8; 2];
        self.cmd_and_read(Command::ReadPrevTemp, &mut read_buf).await?;
        Ok(RawReading::from_bytes(&read_buf, None).centigrade())
    }

    /// Measure humidity and fetch the temperature taken with it
    pub async fn measure(&mut self) -> Result<Measurement, Error<E>> {
        let humidity_percent = self.read_humidity().await?;
        let centigrade = self.read_last_temperature().await?;
        Ok(Measurement { humidity_percent, centigrade })
    }

    /// Read RH/T user register 1
    pub async fn read_user_register(&mut self) -> Result<UserRegister, Error<E>> {
        let mut read_buf = [0u8; 1];
        self.cmd_and_read(Command::ReadUserReg, &mut read_buf).await?;
        Ok(UserRegister::from(read_buf[0]))
    }

    /// Write RH/T user register 1
    pub async fn write_user_register(&mut self, reg: UserRegister) -> Result<(), Error<E>> {
        debug!("si7021_async::write_user_register(): 0x{:x}", reg.raw());
        self.cmd_and_write(Command::WriteUserReg, reg.raw()).await
    }

    /// Change measurement resolution
    pub async fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        let reg = self.read_user_register().await?;
        self.write_user_register(reg.with_resolution(resolution)).await
    }

    /// Turn the on-chip heater on or off
    pub async fn set_heater_enabled(&mut self, enabled: bool) -> Result<(), Error<E>> {
        self.require(self.state.capabilities().heater)?;
        let reg = self.read_user_register().await?;
        self.write_user_register(reg.with_heater(enabled)).await
    }

    /// Read the heater control register
    pub async fn read_heater_register(&mut self) -> Result<HeaterRegister, Error<E>> {
        self.require(self.state.capabilities().heater)?;
        let mut read_buf = [0u8; 1];
        self.cmd_and_read(Command::ReadHeaterReg, &mut read_buf).await?;
        Ok(HeaterRegister::from(read_buf[0]))
    }

    /// Set heater drive level (0..=15, higher values are truncated to the low 4 bits).
    /// Does not turn the heater on.
    pub async fn set_heater_power(&mut self, level: u8) -> Result<(), Error<E>> {
        let reg = self.read_heater_register().await?.with_power(level);
        debug!("si7021_async::set_heater_power(): 0x{:x}", reg.raw());
        self.cmd_and_write(Command::WriteHeaterReg, reg.raw()).await
    }

    /// Read the electronic serial number and firmware revision
    pub async fn read_device_info(&mut self) -> Result<DeviceInfo, Error<E>> {
        self.require(self.state.capabilities().device_info)?;
        let mut read_buf = [0u8; 8];
        let mut serial = [0u8; 8];
        self.cmd_and_read(Command::ReadSerialA, &mut read_buf).await?;
        serial[0..4].copy_from_slice(&serial_half(&read_buf));
        self.cmd_and_read(Command::ReadSerialB, &mut read_buf).await?;
        serial[4..8].copy_from_slice(&serial_half(&read_buf));

        let mut rev_buf = [0u8; 1];
        self.cmd_and_read(Command::ReadFirmwareRev, &mut rev_buf).await?;
        Ok(DeviceInfo {
            serial: SerialNumber(serial),
            firmware_revision: FirmwareRevision::from(rev_buf[0]),
        })
    }
}
