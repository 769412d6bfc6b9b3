use crate::calib::CalibData;
use crate::{Altitude, Compensated, Humidity, Measurement, Pressure, Temperature};

/// Raw ADC value of a skipped temperature or pressure conversion.
pub const ADC_DISABLED_20BIT: u32 = 0x8_0000;
/// Raw ADC value of a skipped humidity conversion.
pub const ADC_DISABLED_16BIT: u16 = 0x8000;

/// Upper bound of the humidity accumulator, 100 %RH in Q22.10 shifted by 12.
const HUMIDITY_ACC_MAX: i64 = 419_430_400;

/// Fine temperature (`t_fine`) of one conversion, in the sensor's native units.
///
/// Only temperature compensation can produce one, so pressure and humidity
/// cannot be compensated without the temperature of the same read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FineTemperature(pub(crate) i32);

impl FineTemperature {
    pub fn value(&self) -> i32 {
        self.0
    }
}

/// Result of temperature compensation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalcTempData {
    pub temp_fine: FineTemperature,
    pub temp_comp: Temperature,
}

/// Uncompensated ADC output read from the data registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawData {
    /// 20-bit, from `press_msb`, `press_lsb`, `press_xlsb[7:4]`.
    pub press_adc: u32,
    /// 20-bit, from `temp_msb`, `temp_lsb`, `temp_xlsb[7:4]`.
    pub temp_adc: u32,
    /// 16-bit, from `hum_msb`, `hum_lsb`.
    pub hum_adc: u16,
}

impl RawData {
    /// Unpacks the 8-byte burst starting at `press_msb` (0xF7).
    pub fn from_bytes(buffer: &[u8; 8]) -> Self {
        RawData {
            press_adc: adc_20bit(&buffer[0..3]),
            temp_adc: adc_20bit(&buffer[3..6]),
            hum_adc: adc_16bit(&buffer[6..8]),
        }
    }
}

/// Assembles a top-justified 20-bit conversion from `msb`, `lsb`, `xlsb`.
pub(crate) fn adc_20bit(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 12) | ((bytes[1] as u32) << 4) | ((bytes[2] as u32) >> 4)
}

/// Assembles a big-endian 16-bit conversion from `msb`, `lsb`.
pub(crate) fn adc_16bit(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

impl CalibData {
    /// Compensates one full sample: temperature first, then pressure and
    /// humidity with the fine temperature of the same sample.
    ///
    /// A disabled temperature channel disables everything that depends on it.
    pub fn compensate(&self, raw: &RawData, sea_level_pressure: f32) -> Measurement {
        let temp = match self.calc_temp(raw.temp_adc) {
            Compensated::Value(temp) => temp,
            Compensated::Disabled => return Measurement::default(),
        };

        let pres = self.calc_pres(temp.temp_fine, raw.press_adc);
        let hum = self.calc_hum(temp.temp_fine, raw.hum_adc);

        Measurement {
            temp: Compensated::Value(temp.temp_comp),
            pres,
            hum,
            altitude: pres.map(|p| Altitude::from_pressure(p, sea_level_pressure)),
        }
    }

    /// Converts the raw temperature ADC value into hundredths of a degree Celsius.
    ///
    /// Also yields `t_fine`, which pressure and humidity compensation require.
    /// Intermediates are widened to 64 bit; for every input where the
    /// datasheet's 32-bit formula does not overflow, the result is identical.
    pub fn calc_temp(&self, temp_adc: u32) -> Compensated<CalcTempData> {
        if temp_adc == ADC_DISABLED_20BIT {
            return Compensated::Disabled;
        }

        let adc = temp_adc as i64;
        let t1 = self.dig_t1 as i64;
        let t2 = self.dig_t2 as i64;
        let t3 = self.dig_t3 as i64;

        let var1 = (((adc >> 3) - (t1 << 1)) * t2) >> 11;
        let var2 = (((((adc >> 4) - t1) * ((adc >> 4) - t1)) >> 12) * t3) >> 14;
        let t_fine = var1 + var2;

        Compensated::Value(CalcTempData {
            temp_fine: FineTemperature(t_fine as i32),
            temp_comp: Temperature(((t_fine * 5 + 128) >> 8) as i32),
        })
    }

    /// Converts the raw pressure ADC value into Pascal, Q24.8 (1/256 Pa).
    ///
    /// 64-bit fixed point throughout. A zero first-stage term would divide by
    /// zero; the datasheet defines the result as 0 Pa in that case.
    /// Products wrap instead of overflowing, so corrupt calibration data yields
    /// a meaningless value but never a panic.
    pub fn calc_pres(&self, t_fine: FineTemperature, press_adc: u32) -> Compensated<Pressure> {
        if press_adc == ADC_DISABLED_20BIT {
            return Compensated::Disabled;
        }

        let p1 = self.dig_p1 as i64;
        let p2 = self.dig_p2 as i64;
        let p3 = self.dig_p3 as i64;
        let p4 = self.dig_p4 as i64;
        let p5 = self.dig_p5 as i64;
        let p6 = self.dig_p6 as i64;
        let p7 = self.dig_p7 as i64;
        let p8 = self.dig_p8 as i64;
        let p9 = self.dig_p9 as i64;

        let mut var1 = t_fine.0 as i64 - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(p6);
        var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 17);
        var2 = var2.wrapping_add(p4 << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(p3) >> 8)
            .wrapping_add(var1.wrapping_mul(p2) << 12);
        var1 = ((1i64 << 47).wrapping_add(var1)).wrapping_mul(p1) >> 33;

        if var1 == 0 {
            return Compensated::Value(Pressure(0));
        }

        let mut p = 1_048_576 - press_adc as i64;
        p = ((p << 31).wrapping_sub(var2))
            .wrapping_mul(3125)
            .wrapping_div(var1);
        let var1 = p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        let var2 = p8.wrapping_mul(p) >> 19;
        p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(p7 << 4);

        Compensated::Value(Pressure(p as u32))
    }

    /// Converts the raw humidity ADC value into %RH, Q22.10 (1/1024 %).
    ///
    /// The accumulator is clamped to `[0, 419430400]` before the final shift,
    /// so the result never leaves 0..=100 %RH.
    pub fn calc_hum(&self, t_fine: FineTemperature, hum_adc: u16) -> Compensated<Humidity> {
        if hum_adc == ADC_DISABLED_16BIT {
            return Compensated::Disabled;
        }

        let adc = hum_adc as i64;
        let h1 = self.dig_h1 as i64;
        let h2 = self.dig_h2 as i64;
        let h3 = self.dig_h3 as i64;
        let h4 = self.dig_h4 as i64;
        let h5 = self.dig_h5 as i64;
        let h6 = self.dig_h6 as i64;

        let mut acc = t_fine.0 as i64 - 76_800;
        let scaled = ((adc << 14) - (h4 << 20))
            .wrapping_sub(h5.wrapping_mul(acc))
            .wrapping_add(16_384)
            >> 15;
        let temp_term = (acc.wrapping_mul(h6) >> 10)
            .wrapping_mul((acc.wrapping_mul(h3) >> 11) + 32_768)
            >> 10;
        let temp_term = temp_term
            .wrapping_add(2_097_152)
            .wrapping_mul(h2)
            .wrapping_add(8_192)
            >> 14;
        acc = scaled.wrapping_mul(temp_term);
        acc = acc.wrapping_sub(((acc >> 15).wrapping_mul(acc >> 15) >> 7).wrapping_mul(h1) >> 4);
        let acc = acc.clamp(0, HUMIDITY_ACC_MAX);

        Compensated::Value(Humidity((acc >> 12) as u32))
    }
}

/// Altitude in metres for `pressure` (Pa) relative to `sea_level` (Pa).
///
/// International barometric formula, `44330 * (1 - (P / P0)^0.1903)`.
pub fn altitude(pressure: f32, sea_level: f32) -> f32 {
    44_330.0 * (1.0 - libm::powf(pressure / sea_level, 0.1903))
}

/// Sea-level equivalent pressure (Pa) for `pressure` (Pa) measured at `altitude` (m).
///
/// Inverse of [`altitude`]: `P / (1 - h / 44330)^5.255`.
pub fn sea_level_pressure(altitude: f32, pressure: f32) -> f32 {
    pressure / libm::powf(1.0 - altitude / 44_330.0, 5.255)
}
