#![cfg_attr(not(test), no_std)]

//! # BME280 Environmental Sensor Driver
//!
//! A type-safe, `no_std` driver for the Bosch BME280.
//! This driver uses the typestate pattern to ensure the sensor is identified,
//! reset and calibrated before measurements are taken.
//!
//! ## Features
//! - **I2C and SPI**: Any bus implementing [`interface::RegisterBus`] works,
//!   including an in-memory fake for tests.
//! - **Bit-exact compensation**: Bosch's integer formulas, no FPU required
//!   (only altitude uses floating point).
//! - **Typestate Pattern**: Prevents measuring before initialization.
//! - **Disabled channels**: Skipped conversions surface as [`Compensated::Disabled`]
//!   instead of plausible-looking numbers.
//!
//! ## Units
//! - **Temperature**: Centigrade (C * 100) -> 2508 = 25.08 °C
//! - **Humidity**: Q22.10 (RH % * 1024) -> 56317 = 54.997 %
//! - **Pressure**: Q24.8 (Pa * 256) -> 25767233 = 100653.25 Pa
//! - **Altitude**: Metres, relative to the configured sea-level pressure
//!
//! ## Example
//! ```no_run
//! use bme280_driver::{interface::DeviceAddress, Bme280, Config};
//! # fn run<I2C: embedded_hal::i2c::I2c, D: embedded_hal::delay::DelayNs>(i2c: I2C, mut delay: D)
//! #     -> Result<(), bme280_driver::error::Bme280Error<I2C::Error>> {
//! let mut bme280 = Bme280::new(i2c, DeviceAddress::Primary).init(&mut delay, Config::default())?;
//! let measurement = bme280.read_all(&mut delay)?;
//!
//! if let Some(temp) = measurement.temp.value() {
//!     let (whole, frac) = temp.split();
//!     // 25.08 °C
//! }
//! # Ok(())
//! # }
//! ```

mod calc;
mod calib;
pub mod interface;
mod settings;

use core::marker::PhantomData;
use embedded_hal::{delay::DelayNs, i2c, spi};
use log::{debug, trace, warn};

pub use calc::{
    altitude, sea_level_pressure, CalcTempData, FineTemperature, RawData, ADC_DISABLED_16BIT,
    ADC_DISABLED_20BIT,
};
pub use calib::CalibData;
pub use settings::{
    Bme280Builder, Config, IIRFilter, Mode, Oversampling, OversamplingConfig, StandbyTime,
    STANDARD_SEA_LEVEL_PRESSURE,
};

use calib::calib_mem;
use interface::{DeviceAddress, I2cInterface, RegisterBus, SpiInterface};

/// Register addresses and fixed values of the BME280.
pub mod regs {
    pub const ADDR_CHIP_ID: u8 = 0xD0;
    pub const ADDR_RESET: u8 = 0xE0;
    pub const ADDR_CTRL_HUM: u8 = 0xF2;
    pub const ADDR_STATUS: u8 = 0xF3;
    pub const ADDR_CTRL_MEAS: u8 = 0xF4;
    pub const ADDR_CONFIG: u8 = 0xF5;
    /// Start of the 8-byte data burst (`press_msb`).
    pub const ADDR_PRESS_MSB: u8 = 0xF7;
    pub const ADDR_TEMP_MSB: u8 = 0xFA;

    pub const CHIP_ID: u8 = 0x60;
    pub const RESET_COMMAND: u8 = 0xB6;

    /// `status[3]`: conversion running.
    pub const STATUS_MEASURING: u8 = 0b1000;
    /// `status[0]`: NVM data being copied to the image registers.
    pub const STATUS_IM_UPDATE: u8 = 0b0001;
}

/// Timing of the reset handshake and of forced-mode conversions.
mod timing {
    /// Start-up time after a soft reset before the status register is meaningful.
    pub const RESET_SETTLE_MS: u32 = 2;
    pub const CALIB_POLL_INTERVAL_MS: u32 = 2;
    pub const CALIB_POLL_LIMIT: u32 = 5;
    pub const MEASURE_POLL_INTERVAL_US: u32 = 500;
    pub const MEASURE_POLL_LIMIT: u32 = 10;
}

// --- Typestates ---

/// Sensor has been created but not yet identified and calibrated.
#[derive(Debug)]
pub struct Uninitialized;
/// Sensor is identified, calibrated and configured; ready for measurements.
#[derive(Debug)]
pub struct Ready;

/// Error types for the BME280 driver.
pub mod error {
    use core::fmt;

    /// Errors that can occur during initialization or a read cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Bme280Error<E> {
        /// Underlying bus failure. Never retried by the driver.
        Transport(E),
        /// The chip-ID register did not hold 0x60. Carries the value read.
        UnexpectedDevice(u8),
        /// NVM calibration data was still being copied after the poll limit.
        CalibrationTimeout,
        /// A forced-mode conversion did not finish within the poll limit.
        MeasurementTimeout,
    }

    impl<E: fmt::Debug> fmt::Display for Bme280Error<E> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Bme280Error::Transport(e) => write!(f, "bus error: {:?}", e),
                Bme280Error::UnexpectedDevice(id) => {
                    write!(f, "unexpected chip id {:#04x}, expected 0x60", id)
                }
                Bme280Error::CalibrationTimeout => f.write_str("calibration data not ready"),
                Bme280Error::MeasurementTimeout => f.write_str("measurement timed out"),
            }
        }
    }

    impl<E: fmt::Debug> core::error::Error for Bme280Error<E> {}

    /// Result type alias for BME280 operations.
    pub type Result<T, E> = core::result::Result<T, Bme280Error<E>>;
}

/// Represents temperature in Centigrade (degrees Celsius * 100).
///
/// # Example
/// A value of `2508` represents **25.08 °C**.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature(pub i32);

impl Temperature {
    /// Splits the fixed-point value into integral (degrees) and fractional (decimals) parts.
    ///
    /// # Example
    /// ```rust
    /// use bme280_driver::Temperature;
    /// let temp = Temperature(2508);
    /// assert_eq!(temp.split(), (25, 8)); // Represents 25.08 °C
    /// ```
    pub fn split(&self) -> (i32, i32) {
        (self.0 / 100, self.0 % 100)
    }

    /// Temperature in degrees Celsius as a float.
    pub fn celsius(&self) -> f32 {
        self.0 as f32 / 100.0
    }
}

/// Formats as degrees with two decimals, keeping the sign between -1 and 0 °C.
impl core::fmt::Display for Temperature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (whole, frac) = self.split();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, whole.abs(), frac.abs())
    }
}

/// Represents atmospheric pressure in Pascal, Q24.8 (Pa * 256).
///
/// # Example
/// A value of `25767233` represents **100653.25 Pa**.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pressure(pub u32);

impl Pressure {
    /// Whole Pascals, after the final scale by 1/256.
    pub fn pascals(&self) -> u32 {
        self.0 >> 8
    }

    /// Pressure in Pascal including the fractional part.
    pub fn pascals_f32(&self) -> f32 {
        self.0 as f32 / 256.0
    }

    /// Converts to Hectopascal (hPa) and splits it into parts.
    ///
    /// # Example
    /// ```rust
    /// use bme280_driver::Pressure;
    /// let press = Pressure(101325 << 8);
    /// assert_eq!(press.as_hpa(), (1013, 25)); // Represents 1013.25 hPa
    /// ```
    pub fn as_hpa(&self) -> (u32, u32) {
        let pa = self.pascals();
        (pa / 100, pa % 100)
    }
}

/// Represents relative humidity in Q22.10 (percent * 1024).
///
/// # Example
/// A value of `56317` represents **54.997 %rH**.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Humidity(pub u32);

impl Humidity {
    /// Splits the fixed-point value into integral percent and hundredths.
    ///
    /// # Example
    /// ```rust
    /// use bme280_driver::Humidity;
    /// let hum = Humidity(56317);
    /// assert_eq!(hum.split(), (54, 99)); // Represents 54.99 %
    /// ```
    pub fn split(&self) -> (u32, u32) {
        (self.0 >> 10, ((self.0 & 0x3FF) * 100) >> 10)
    }

    /// Relative humidity in percent as a float.
    pub fn percent(&self) -> f32 {
        self.0 as f32 / 1024.0
    }
}

/// Altitude in metres, derived from pressure and a sea-level reference.
#[derive(Debug, Copy, Clone, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Altitude(pub f32);

impl Altitude {
    /// Altitude for `pressure` relative to `sea_level_pressure` (Pa).
    pub fn from_pressure(pressure: Pressure, sea_level_pressure: f32) -> Self {
        Altitude(calc::altitude(pressure.pascals_f32(), sea_level_pressure))
    }
}

/// Outcome of compensating one channel.
///
/// `Disabled` means the sensor reported the "measurement skipped" sentinel.
/// That raw value is numerically valid-looking, so it is never converted.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Compensated<T> {
    /// Converted value in physical units.
    Value(T),
    /// The channel was skipped for this conversion.
    Disabled,
}

impl<T> Default for Compensated<T> {
    fn default() -> Self {
        Compensated::Disabled
    }
}

impl<T> Compensated<T> {
    /// Converts into an `Option`, mapping `Disabled` to `None`.
    pub fn value(self) -> Option<T> {
        match self {
            Compensated::Value(v) => Some(v),
            Compensated::Disabled => None,
        }
    }

    /// Returns `true` if the channel was skipped.
    pub fn is_disabled(&self) -> bool {
        matches!(self, Compensated::Disabled)
    }

    /// Applies `f` to a compensated value, leaving `Disabled` untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Compensated<U> {
        match self {
            Compensated::Value(v) => Compensated::Value(f(v)),
            Compensated::Disabled => Compensated::Disabled,
        }
    }

    /// Chains a compensation step that may itself report `Disabled`.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Compensated<U>) -> Compensated<U> {
        match self {
            Compensated::Value(v) => f(v),
            Compensated::Disabled => Compensated::Disabled,
        }
    }
}

/// Compensated measurement result in physical units.
///
/// If the temperature channel is disabled, every other field is disabled too,
/// since pressure and humidity cannot be compensated without it.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub temp: Compensated<Temperature>,
    pub pres: Compensated<Pressure>,
    pub hum: Compensated<Humidity>,
    pub altitude: Compensated<Altitude>,
}

/// The main BME280 driver structure.
///
/// Use `Bme280::new(...)` to start. The `STATE` generic uses the typestate
/// pattern to track initialization status at compile time.
///
/// One instance owns the bus handle exclusively. Calls on a single instance
/// must be serialized; the calibration table itself is plain data and can be
/// copied out with [`Bme280::calibration`] and shared freely.
#[derive(Debug)]
pub struct Bme280<BUS, STATE> {
    bus: BUS,
    pub(crate) calib_data: CalibData,
    config: Config,
    _state: PhantomData<STATE>,
}

impl<I2C, E> Bme280<I2cInterface<I2C>, Uninitialized>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Creates a new I2C driver instance in the `Uninitialized` state.
    ///
    /// This does not communicate with the sensor yet.
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus object.
    /// * `address` - `Primary` (0x76) or `Secondary` (0x77), depending on SDO.
    pub fn new(i2c: I2C, address: DeviceAddress) -> Self {
        Self::with_interface(I2cInterface::new(i2c, address))
    }
}

impl<I2C, E> Bme280<I2cInterface<I2C>, Ready>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Creates and initializes an I2C driver in one step.
    pub fn open(
        i2c: I2C,
        address: DeviceAddress,
        config: Config,
        delay: &mut impl DelayNs,
    ) -> error::Result<Self, E> {
        Bme280::new(i2c, address).init(delay, config)
    }
}

impl<SPI, E> Bme280<SpiInterface<SPI>, Uninitialized>
where
    SPI: spi::SpiDevice<Error = E>,
{
    /// Creates a new 4-wire SPI driver instance in the `Uninitialized` state.
    pub fn new_spi(spi: SPI) -> Self {
        Self::with_interface(SpiInterface::new(spi))
    }
}

impl<BUS, STATE, E> Bme280<BUS, STATE>
where
    BUS: RegisterBus<Error = E>,
{
    /// Reads the Chip ID from the sensor (expected value: 0x60).
    pub fn read_chip_id(&mut self) -> error::Result<u8, E> {
        self.read_reg_byte(regs::ADDR_CHIP_ID)
    }

    /// Gives back the bus interface.
    pub fn release(self) -> BUS {
        self.bus
    }

    /// Performs a soft-reset of the sensor.
    ///
    /// This resets all internal registers to their power-on defaults and is
    /// safe to issue on an already running device.
    fn soft_reset(&mut self, delay: &mut impl DelayNs) -> error::Result<(), E> {
        self.write_reg(regs::ADDR_RESET, regs::RESET_COMMAND)?;
        delay.delay_ms(timing::RESET_SETTLE_MS);
        Ok(())
    }

    /// Reads data from a starting register address into a provided buffer.
    fn read_into(&mut self, reg_address: u8, buffer: &mut [u8]) -> error::Result<(), E> {
        self.bus
            .read_registers(reg_address, buffer)
            .map_err(error::Bme280Error::Transport)
    }

    /// Reads a single byte from a specific register address.
    fn read_reg_byte(&mut self, reg_address: u8) -> error::Result<u8, E> {
        let mut buffer = [0];
        self.read_into(reg_address, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Writes a single register.
    fn write_reg(&mut self, reg_address: u8, value: u8) -> error::Result<(), E> {
        self.bus
            .write_register(reg_address, value)
            .map_err(error::Bme280Error::Transport)
    }
}

impl<BUS, E> Bme280<BUS, Uninitialized>
where
    BUS: RegisterBus<Error = E>,
{
    /// Creates a driver on top of any register bus.
    pub fn with_interface(bus: BUS) -> Self {
        Bme280 {
            bus,
            calib_data: CalibData::default(),
            config: Config::default(),
            _state: PhantomData,
        }
    }

    /// Initializes the sensor and transitions to `Ready`.
    ///
    /// Strictly ordered: verify the chip ID, soft-reset, wait for the NVM copy
    /// to finish, read the calibration table, then program `ctrl_hum`,
    /// `ctrl_meas` and `config` in that order (the humidity setting only takes
    /// effect after a subsequent `ctrl_meas` write).
    ///
    /// # Errors
    /// Any bus error aborts initialization. No partially initialized driver is returned.
    pub fn init(
        mut self,
        delay: &mut impl DelayNs,
        config: Config,
    ) -> error::Result<Bme280<BUS, Ready>, E> {
        let chip_id = self.read_chip_id()?;
        if chip_id != regs::CHIP_ID {
            warn!("unexpected chip id {:#04x}", chip_id);
            return Err(error::Bme280Error::UnexpectedDevice(chip_id));
        }

        self.soft_reset(delay)?;
        self.wait_for_nvm_copy(delay)?;

        let calib_data = self.get_calib_data()?;
        debug!("calibration loaded: {:?}", calib_data);

        let mut sensor = Bme280 {
            bus: self.bus,
            calib_data,
            config,
            _state: PhantomData,
        };
        sensor.write_config()?;

        Ok(sensor)
    }

    /// Polls `status.im_update` until the calibration image is valid.
    fn wait_for_nvm_copy(&mut self, delay: &mut impl DelayNs) -> error::Result<(), E> {
        for attempt in 0..timing::CALIB_POLL_LIMIT {
            let status = self.read_reg_byte(regs::ADDR_STATUS)?;
            if status & regs::STATUS_IM_UPDATE == 0 {
                trace!("nvm copy finished after {} polls", attempt + 1);
                return Ok(());
            }
            delay.delay_ms(timing::CALIB_POLL_INTERVAL_MS);
        }

        warn!("nvm copy still running after reset");
        Err(error::Bme280Error::CalibrationTimeout)
    }

    /// Reads factory-fused calibration coefficients from the sensor's NVM image.
    ///
    /// The BME280 stores them in two non-contiguous register blocks.
    fn get_calib_data(&mut self) -> error::Result<CalibData, E> {
        let mut buffer = [0u8; calib_mem::TOTAL_SIZE];

        // 1. Read first block (0x88..=0xA1)
        self.read_into(calib_mem::ADDR[0], &mut buffer[0..calib_mem::SIZES[0]])?;
        // 2. Read second block (0xE1..=0xE7)
        self.read_into(calib_mem::ADDR[1], &mut buffer[calib_mem::SIZES[0]..])?;

        Ok(CalibData::from_bytes(&buffer))
    }
}

impl<BUS, E> Bme280<BUS, Ready>
where
    BUS: RegisterBus<Error = E>,
{
    /// Performs one full temperature/pressure/humidity/altitude cycle.
    ///
    /// In `Mode::Forced` a conversion is triggered and awaited first.
    pub fn read_all(&mut self, delay: &mut impl DelayNs) -> error::Result<Measurement, E> {
        self.trigger_if_forced(delay)?;

        let mut buffer = [0u8; 8];
        self.read_into(regs::ADDR_PRESS_MSB, &mut buffer)?;
        let raw = RawData::from_bytes(&buffer);
        trace!("raw sample: {:?}", raw);

        Ok(self.calib_data.compensate(&raw, self.config.sea_level_pressure))
    }

    /// Reads and compensates temperature only.
    pub fn read_temperature(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> error::Result<Compensated<Temperature>, E> {
        self.trigger_if_forced(delay)?;

        let mut buffer = [0u8; 3];
        self.read_into(regs::ADDR_TEMP_MSB, &mut buffer)?;

        Ok(self
            .calib_data
            .calc_temp(calc::adc_20bit(&buffer))
            .map(|t| t.temp_comp))
    }

    /// Reads and compensates pressure.
    ///
    /// Temperature of the same conversion is read along with it, since
    /// pressure compensation needs its fine temperature.
    pub fn read_pressure(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> error::Result<Compensated<Pressure>, E> {
        self.trigger_if_forced(delay)?;

        // press_msb..=temp_xlsb
        let mut buffer = [0u8; 6];
        self.read_into(regs::ADDR_PRESS_MSB, &mut buffer)?;

        let press_adc = calc::adc_20bit(&buffer[0..3]);
        let temp_adc = calc::adc_20bit(&buffer[3..6]);

        Ok(self
            .calib_data
            .calc_temp(temp_adc)
            .and_then(|t| self.calib_data.calc_pres(t.temp_fine, press_adc)))
    }

    /// Reads and compensates humidity, together with the temperature it depends on.
    pub fn read_humidity(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> error::Result<Compensated<Humidity>, E> {
        self.trigger_if_forced(delay)?;

        // temp_msb..=hum_lsb
        let mut buffer = [0u8; 5];
        self.read_into(regs::ADDR_TEMP_MSB, &mut buffer)?;

        let temp_adc = calc::adc_20bit(&buffer[0..3]);
        let hum_adc = calc::adc_16bit(&buffer[3..5]);

        Ok(self
            .calib_data
            .calc_temp(temp_adc)
            .and_then(|t| self.calib_data.calc_hum(t.temp_fine, hum_adc)))
    }

    /// Reads pressure and converts it to altitude against the configured sea-level pressure.
    pub fn read_altitude(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> error::Result<Compensated<Altitude>, E> {
        let sea_level = self.config.sea_level_pressure;
        Ok(self
            .read_pressure(delay)?
            .map(|p| Altitude::from_pressure(p, sea_level)))
    }

    /// Applies a new configuration at runtime.
    ///
    /// The device is put to sleep first because `config` writes are ignored
    /// in normal mode. `ctrl_meas` with the target mode is written last.
    pub fn configure(&mut self, config: Config) -> error::Result<(), E> {
        self.config = config;
        self.write_reg(
            regs::ADDR_CTRL_MEAS,
            self.config.ctrl_meas_with_mode(Mode::Sleep),
        )?;
        self.write_reg(regs::ADDR_CTRL_HUM, self.config.ctrl_hum())?;
        self.write_reg(regs::ADDR_CONFIG, self.config.config_reg())?;
        self.write_reg(regs::ADDR_CTRL_MEAS, self.config.ctrl_meas())?;
        Ok(())
    }

    /// Updates the sea-level reference used for altitude. No bus traffic.
    pub fn set_sea_level_pressure(&mut self, pascals: f32) {
        self.config.sea_level_pressure = pascals;
    }

    /// Soft-resets the device. Calibration must be reloaded with `init` afterwards.
    pub fn reset(
        mut self,
        delay: &mut impl DelayNs,
    ) -> error::Result<Bme280<BUS, Uninitialized>, E> {
        self.soft_reset(delay)?;
        Ok(Bme280 {
            bus: self.bus,
            calib_data: CalibData::default(),
            config: Config::default(),
            _state: PhantomData,
        })
    }

    /// Copy of the calibration table read during `init`.
    pub fn calibration(&self) -> CalibData {
        self.calib_data
    }

    /// Configuration currently applied to the device.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Programs the measurement registers in the order the device requires.
    fn write_config(&mut self) -> error::Result<(), E> {
        self.write_reg(regs::ADDR_CTRL_HUM, self.config.ctrl_hum())?;
        self.write_reg(regs::ADDR_CTRL_MEAS, self.config.ctrl_meas())?;
        self.write_reg(regs::ADDR_CONFIG, self.config.config_reg())?;
        Ok(())
    }

    /// In forced mode, starts one conversion and waits until it is finished.
    ///
    /// Nothing is triggered when every channel is skipped.
    fn trigger_if_forced(&mut self, delay: &mut impl DelayNs) -> error::Result<(), E> {
        if self.config.mode != Mode::Forced || self.config.osrs_config.is_all_skipped() {
            return Ok(());
        }

        self.write_reg(
            regs::ADDR_CTRL_MEAS,
            self.config.ctrl_meas_with_mode(Mode::Forced),
        )?;
        delay.delay_us(self.config.max_measurement_time_us());

        for _ in 0..timing::MEASURE_POLL_LIMIT {
            if self.read_reg_byte(regs::ADDR_STATUS)? & regs::STATUS_MEASURING == 0 {
                return Ok(());
            }
            delay.delay_us(timing::MEASURE_POLL_INTERVAL_US);
        }

        warn!("forced conversion did not finish");
        Err(error::Bme280Error::MeasurementTimeout)
    }
}


#[cfg(test)]
mod sequencer_tests {
    //! Initialization sequencing against an in-memory register map.

    use super::*;
    use crate::calib::tests::FIXTURE_CALIB;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct BusFault(u8);

    /// Simulated sensor: a 256-byte register file plus a write log.
    struct FakeBus {
        regs: [u8; 256],
        writes: Vec<(u8, u8)>,
        status_reads: u32,
        /// Number of status reads that still report `busy_bits`.
        busy_polls: u32,
        busy_bits: u8,
        fail_on: Option<u8>,
    }

    impl FakeBus {
        fn new() -> Self {
            let mut regs = [0u8; 256];
            regs[regs::ADDR_CHIP_ID as usize] = regs::CHIP_ID;
            regs[0x88..0x88 + 26].copy_from_slice(&FIXTURE_CALIB[..26]);
            regs[0xE1..0xE1 + 7].copy_from_slice(&FIXTURE_CALIB[26..]);
            regs[0xF7..0xFF].copy_from_slice(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30]);
            FakeBus {
                regs,
                writes: Vec::new(),
                status_reads: 0,
                busy_polls: 0,
                busy_bits: regs::STATUS_IM_UPDATE,
                fail_on: None,
            }
        }
    }

    impl RegisterBus for FakeBus {
        type Error = BusFault;

        fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), BusFault> {
            if self.fail_on == Some(reg) {
                return Err(BusFault(reg));
            }
            if reg == regs::ADDR_STATUS {
                self.status_reads += 1;
                buffer[0] = if self.busy_polls > 0 {
                    self.busy_polls -= 1;
                    self.busy_bits
                } else {
                    0
                };
                return Ok(());
            }
            let start = reg as usize;
            buffer.copy_from_slice(&self.regs[start..start + buffer.len()]);
            Ok(())
        }

        fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusFault> {
            if self.fail_on == Some(reg) {
                return Err(BusFault(reg));
            }
            self.writes.push((reg, value));
            self.regs[reg as usize] = value;
            Ok(())
        }
    }

    #[test]
    fn wrong_chip_id_stops_initialization() {
        let mut bus = FakeBus::new();
        // BMP280 answers with 0x58
        bus.regs[regs::ADDR_CHIP_ID as usize] = 0x58;

        let result = Bme280::with_interface(bus).init(&mut NoopDelay::new(), Config::default());
        assert!(matches!(
            result,
            Err(error::Bme280Error::UnexpectedDevice(0x58))
        ));
    }

    #[test]
    fn writes_follow_required_order() {
        let bme280 = Bme280::with_interface(FakeBus::new())
            .init(&mut NoopDelay::new(), Config::default())
            .unwrap();
        assert_eq!(bme280.calibration(), CalibData::from_bytes(&FIXTURE_CALIB));

        let bus = bme280.release();
        assert_eq!(
            bus.writes,
            vec![(0xE0, 0xB6), (0xF2, 0x01), (0xF4, 0x27), (0xF5, 0xA0)]
        );
    }

    #[test]
    fn waits_for_nvm_copy() {
        let mut bus = FakeBus::new();
        bus.busy_polls = 4;

        let bme280 = Bme280::with_interface(bus)
            .init(&mut NoopDelay::new(), Config::default())
            .unwrap();
        assert_eq!(bme280.release().status_reads, 5);
    }

    #[test]
    fn nvm_copy_poll_is_bounded() {
        let mut bus = FakeBus::new();
        bus.busy_polls = u32::MAX;

        let result = Bme280::with_interface(bus).init(&mut NoopDelay::new(), Config::default());
        assert!(matches!(
            result,
            Err(error::Bme280Error::CalibrationTimeout)
        ));
    }

    #[test]
    fn bus_error_during_calibration_read_is_fatal() {
        let mut bus = FakeBus::new();
        bus.fail_on = Some(0xE1);

        let result = Bme280::with_interface(bus).init(&mut NoopDelay::new(), Config::default());
        assert!(matches!(
            result,
            Err(error::Bme280Error::Transport(BusFault(0xE1)))
        ));
    }

    #[test]
    fn bus_error_during_reset_is_fatal() {
        let mut bus = FakeBus::new();
        bus.fail_on = Some(regs::ADDR_RESET);

        let result = Bme280::with_interface(bus).init(&mut NoopDelay::new(), Config::default());
        assert!(matches!(
            result,
            Err(error::Bme280Error::Transport(BusFault(0xE0)))
        ));
    }

    #[test]
    fn read_error_is_propagated() {
        let mut bme280 = Bme280::with_interface(FakeBus::new())
            .init(&mut NoopDelay::new(), Config::default())
            .unwrap();

        bme280.bus.fail_on = Some(regs::ADDR_PRESS_MSB);
        assert!(matches!(
            bme280.read_all(&mut NoopDelay::new()),
            Err(error::Bme280Error::Transport(BusFault(0xF7)))
        ));
    }

    #[test]
    fn forced_conversion_poll_is_bounded() {
        let config = Bme280Builder::new().mode(Mode::Forced).build();
        let mut bme280 = Bme280::with_interface(FakeBus::new())
            .init(&mut NoopDelay::new(), config)
            .unwrap();

        bme280.bus.busy_bits = regs::STATUS_MEASURING;
        bme280.bus.busy_polls = u32::MAX;
        let result = bme280.read_all(&mut NoopDelay::new());
        assert!(matches!(result, Err(error::Bme280Error::MeasurementTimeout)));
    }

    #[test]
    fn compensation_matches_fixture_through_fake_bus() {
        let mut bme280 = Bme280::with_interface(FakeBus::new())
            .init(&mut NoopDelay::new(), Config::default())
            .unwrap();

        let measurement = bme280.read_all(&mut NoopDelay::new()).unwrap();
        assert_eq!(measurement.temp, Compensated::Value(Temperature(2508)));
        assert_eq!(measurement.hum, Compensated::Value(Humidity(56317)));
    }
}
