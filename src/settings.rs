/// Oversampling settings for Temperature, Pressure and Humidity.
///
/// Higher oversampling rates reduce noise by averaging in hardware, but
/// lengthen every conversion and raise the current drawn per measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    /// No measurement. The channel reads back as its disabled sentinel.
    Skipped = 0,
    /// 1x Oversampling (default).
    #[default]
    X1 = 1,
    /// 2x Oversampling.
    X2 = 2,
    /// 4x Oversampling.
    X4 = 3,
    /// 8x Oversampling.
    X8 = 4,
    /// 16x Oversampling.
    X16 = 5,
}

impl Oversampling {
    /// Number of samples averaged per conversion.
    pub fn samples(self) -> u32 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

/// Grouped oversampling settings for all three channels.
///
/// Use `Oversampling::Skipped` to disable channels the application does not need.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OversamplingConfig {
    /// Temperature oversampling.
    pub temp_osrs: Oversampling,
    /// Humidity oversampling.
    pub hum_osrs: Oversampling,
    /// Pressure oversampling.
    pub pres_osrs: Oversampling,
}

impl OversamplingConfig {
    /// Returns `true` if all channels are set to `Skipped`.
    pub fn is_all_skipped(&self) -> bool {
        self.temp_osrs == Oversampling::Skipped
            && self.hum_osrs == Oversampling::Skipped
            && self.pres_osrs == Oversampling::Skipped
    }
}

/// Coefficient of the IIR (Infinite Impulse Response) filter.
///
/// The filter smooths short-term disturbances in pressure and temperature
/// (slamming doors, wind). It has no effect on humidity.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IIRFilter {
    /// Filter disabled.
    #[default]
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

/// Inactive time between two conversions in `Mode::Normal`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StandbyTime {
    Ms0_5 = 0,
    Ms62_5 = 1,
    Ms125 = 2,
    Ms250 = 3,
    Ms500 = 4,
    #[default]
    Ms1000 = 5,
    Ms10 = 6,
    Ms20 = 7,
}

/// Power mode written to the lower two bits of `ctrl_meas`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// No conversions. Registers stay accessible.
    Sleep = 0b00,
    /// One conversion per trigger, then back to sleep.
    Forced = 0b01,
    /// Continuous conversions separated by the standby time.
    #[default]
    Normal = 0b11,
}

/// Standard atmosphere at sea level in Pascal.
pub const STANDARD_SEA_LEVEL_PRESSURE: f32 = 101_325.0;

/// Complete sensor configuration applied during `init` or `configure`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Oversampling settings for T, P and H.
    pub osrs_config: OversamplingConfig,
    /// IIR filter setting for noise suppression.
    pub iir_filter: IIRFilter,
    /// Standby time between conversions in normal mode.
    pub standby_time: StandbyTime,
    /// Operating mode.
    pub mode: Mode,
    /// Reference sea-level pressure in Pascal used for altitude.
    pub sea_level_pressure: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osrs_config: OversamplingConfig::default(),
            iir_filter: IIRFilter::default(),
            standby_time: StandbyTime::default(),
            mode: Mode::default(),
            sea_level_pressure: STANDARD_SEA_LEVEL_PRESSURE,
        }
    }
}

impl Config {
    /// Value for the `ctrl_hum` register (0xF2).
    pub fn ctrl_hum(&self) -> u8 {
        self.osrs_config.hum_osrs as u8 & 0x07
    }

    /// Value for the `ctrl_meas` register (0xF4) using the configured mode.
    pub fn ctrl_meas(&self) -> u8 {
        self.ctrl_meas_with_mode(self.mode)
    }

    /// Value for the `ctrl_meas` register (0xF4) with an explicit mode.
    pub(crate) fn ctrl_meas_with_mode(&self, mode: Mode) -> u8 {
        ((self.osrs_config.temp_osrs as u8) << 5)
            | ((self.osrs_config.pres_osrs as u8) << 2)
            | mode as u8
    }

    /// Value for the `config` register (0xF5). 3-wire SPI stays disabled.
    pub fn config_reg(&self) -> u8 {
        ((self.standby_time as u8) << 5) | ((self.iir_filter as u8) << 2)
    }

    /// Worst-case conversion time in microseconds for the configured oversampling.
    ///
    /// Datasheet appendix B, in ms:
    /// `1.25 + 2.3 * osrs_t + (2.3 * osrs_p + 0.575) + (2.3 * osrs_h + 0.575)`.
    /// The pressure and humidity terms vanish for skipped channels.
    pub fn max_measurement_time_us(&self) -> u32 {
        let osrs = &self.osrs_config;
        let mut time_us = 1250 + 2300 * osrs.temp_osrs.samples();

        if osrs.pres_osrs != Oversampling::Skipped {
            time_us += 2300 * osrs.pres_osrs.samples() + 575;
        }
        if osrs.hum_osrs != Oversampling::Skipped {
            time_us += 2300 * osrs.hum_osrs.samples() + 575;
        }

        time_us
    }
}

/// Builder for a `Config`.
#[derive(Default)]
pub struct Bme280Builder {
    config: Config,
}

impl Bme280Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets temperature oversampling.
    pub fn temp_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.temp_osrs = os;
        self
    }

    /// Sets humidity oversampling.
    pub fn hum_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.hum_osrs = os;
        self
    }

    /// Sets pressure oversampling.
    pub fn pres_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.pres_osrs = os;
        self
    }

    /// Sets the IIR filter coefficient.
    pub fn iir_filter(mut self, filter: IIRFilter) -> Self {
        self.config.iir_filter = filter;
        self
    }

    /// Sets the standby time used in normal mode.
    pub fn standby_time(mut self, standby: StandbyTime) -> Self {
        self.config.standby_time = standby;
        self
    }

    /// Sets the operating mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the sea-level reference pressure (Pa) used for altitude.
    pub fn sea_level_pressure(mut self, pascals: f32) -> Self {
        self.config.sea_level_pressure = pascals;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_register_values() {
        let config = Config::default();
        assert_eq!(config.ctrl_hum(), 0x01);
        assert_eq!(config.ctrl_meas(), 0x27);
        assert_eq!(config.config_reg(), 0xA0);
    }

    #[test]
    fn builder_encodes_registers() {
        let config = Bme280Builder::new()
            .temp_oversampling(Oversampling::X2)
            .pres_oversampling(Oversampling::X16)
            .hum_oversampling(Oversampling::Skipped)
            .iir_filter(IIRFilter::X4)
            .standby_time(StandbyTime::Ms62_5)
            .mode(Mode::Forced)
            .build();

        assert_eq!(config.ctrl_hum(), 0x00);
        assert_eq!(config.ctrl_meas(), 0b010_101_01);
        assert_eq!(config.config_reg(), 0b001_010_00);
        assert_eq!(config.ctrl_meas_with_mode(Mode::Sleep), 0b010_101_00);
    }

    #[test]
    fn measurement_time_skips_disabled_channels() {
        let all_x1 = Config::default();
        assert_eq!(all_x1.max_measurement_time_us(), 1250 + 2300 + 2875 + 2875);

        let temp_only = Bme280Builder::new()
            .pres_oversampling(Oversampling::Skipped)
            .hum_oversampling(Oversampling::Skipped)
            .build();
        assert_eq!(temp_only.max_measurement_time_us(), 3550);
    }

    #[test]
    fn all_skipped() {
        let config = Bme280Builder::new()
            .temp_oversampling(Oversampling::Skipped)
            .pres_oversampling(Oversampling::Skipped)
            .hum_oversampling(Oversampling::Skipped)
            .build();
        assert!(config.osrs_config.is_all_skipped());
        assert!(!Config::default().osrs_config.is_all_skipped());
    }
}
