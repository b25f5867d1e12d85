//! Conversion of raw ADC codes into physical units using the double precision
//! formulas of the BME280 datasheet.
//!
//! Pressure and humidity both depend on `t_fine`, a by-product of temperature
//! compensation. It must come from the *same* burst read as the pressure and
//! humidity codes. [`RawSample::temperature`] ties the two together through a
//! borrow; the free functions take `t_fine` explicitly and trust the caller.

use crate::calibration::CalibrationData;

/// Raw pressure/temperature code when that measurement is skipped.
pub const SKIPPED_20BIT: u32 = 0x80000;
/// Raw humidity code when that measurement is skipped.
pub const SKIPPED_16BIT: u32 = 0x8000;

/// One time-coherent burst read of the data registers.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RawSample {
    pub pressure: u32,
    pub temperature: u32,
    pub humidity: u32,
}

impl RawSample {
    /// Decodes the 8 bytes starting at `press_msb` (0xF7).
    pub fn from_bytes(data: &[u8; 8]) -> Self {
        let pressure = (u32::from(data[0]) << 12) | (u32::from(data[1]) << 4) | (u32::from(data[2]) >> 4);
        let temperature = (u32::from(data[3]) << 12) | (u32::from(data[4]) << 4) | (u32::from(data[5]) >> 4);
        let humidity = (u32::from(data[6]) << 8) | u32::from(data[7]);
        RawSample {
            pressure,
            temperature,
            humidity,
        }
    }

    /// Compensates the temperature of this sample. The returned value is the
    /// only way to reach pressure and humidity for the same sample. `None` when
    /// the temperature channel was skipped.
    pub fn temperature<'a>(&'a self, calibration: &'a CalibrationData) -> Option<FineTemperature<'a>> {
        if self.temperature == SKIPPED_20BIT {
            return None;
        }
        let (celsius, t_fine) = compensate_temperature(self.temperature, calibration);
        Some(FineTemperature {
            sample: self,
            calibration,
            celsius,
            t_fine,
        })
    }
}

/// Temperature of one sample together with the `t_fine` it produced.
#[derive(Debug)]
pub struct FineTemperature<'a> {
    sample: &'a RawSample,
    calibration: &'a CalibrationData,
    celsius: f64,
    t_fine: f64,
}

impl<'a> FineTemperature<'a> {
    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    pub fn t_fine(&self) -> f64 {
        self.t_fine
    }

    /// Pressure in hPa of the sample this temperature came from.
    pub fn pressure(&self) -> Option<f64> {
        compensate_pressure(self.sample.pressure, self.calibration, self.t_fine)
    }

    /// Relative humidity in %RH of the sample this temperature came from.
    pub fn humidity(&self) -> Option<f64> {
        compensate_humidity(self.sample.humidity, self.calibration, self.t_fine)
    }
}

/// Holds the `t_fine` of the most recent sample compensated for one device.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompensationState {
    t_fine: Option<f64>,
}

impl CompensationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until a sample has been compensated.
    #[cfg(test)]
    pub fn t_fine(&self) -> Option<f64> {
        self.t_fine
    }
}

/// Temperature in °C, pressure in hPa, relative humidity in %RH.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CompensatedReading {
    pub temperature: f64,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
}

/// Compensates a whole sample. Temperature is always computed first and its
/// `t_fine` replaces whatever the state held before pressure and humidity are
/// derived from it. `None` when the sample carries no temperature.
pub fn compensate(
    raw: &RawSample,
    calibration: &CalibrationData,
    state: &mut CompensationState,
) -> Option<CompensatedReading> {
    state.t_fine = None;
    let temperature = raw.temperature(calibration)?;
    state.t_fine = Some(temperature.t_fine());

    Some(CompensatedReading {
        temperature: temperature.celsius(),
        pressure: temperature.pressure(),
        humidity: temperature.humidity(),
    })
}

/// Returns `(celsius, t_fine)`. The result is not range checked.
pub fn compensate_temperature(raw_t: u32, calibration: &CalibrationData) -> (f64, f64) {
    let adc_t = f64::from(raw_t);
    let t1 = f64::from(calibration.dig_t1);
    let t2 = f64::from(calibration.dig_t2);
    let t3 = f64::from(calibration.dig_t3);

    let var1 = (adc_t / 16384.0 - t1 / 1024.0) * t2;
    let var2 = adc_t / 131072.0 - t1 / 8192.0;
    let var2 = var2 * var2 * t3;
    let t_fine = var1 + var2;
    (t_fine / 5120.0, t_fine)
}

/// Pressure in hPa.
///
/// `t_fine` must come from [`compensate_temperature`] on the same sample.
/// A `t_fine` of exactly zero is what an uninitialized value looks like and
/// yields `None` rather than a plausible but wrong pressure. `None` is also
/// returned when the pressure channel was skipped or the `var1 == 0` guard
/// trips.
pub fn compensate_pressure(raw_p: u32, calibration: &CalibrationData, t_fine: f64) -> Option<f64> {
    if raw_p == SKIPPED_20BIT || t_fine == 0.0 {
        return None;
    }
    let c = calibration;

    let var1 = t_fine / 2.0 - 64000.0;
    let var2 = var1 * var1 * f64::from(c.dig_p6) / 32768.0 + var1 * f64::from(c.dig_p5) * 2.0;
    let var2 = var2 / 4.0 + f64::from(c.dig_p4) * 65536.0;
    let var1 = (f64::from(c.dig_p3) * var1 * var1 / 524288.0 + f64::from(c.dig_p2) * var1) / 524288.0;
    let var1 = (1.0 + var1 / 32768.0) * f64::from(c.dig_p1);
    if var1 == 0.0 {
        return None;
    }

    let p = 1048576.0 - f64::from(raw_p);
    let p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = f64::from(c.dig_p9) * p * p / 2147483648.0;
    let var2 = p * f64::from(c.dig_p8) / 32768.0;
    let p = p + (var1 + var2 + f64::from(c.dig_p7)) / 16.0;
    Some(p / 100.0)
}

/// Relative humidity in %RH, clamped to `[0, 100]`.
///
/// Same `t_fine` contract as [`compensate_pressure`].
pub fn compensate_humidity(raw_h: u32, calibration: &CalibrationData, t_fine: f64) -> Option<f64> {
    if raw_h == SKIPPED_16BIT || t_fine == 0.0 {
        return None;
    }
    let c = calibration;

    let var = t_fine - 76800.0;
    let var = (f64::from(raw_h) - (f64::from(c.dig_h4) * 64.0 + f64::from(c.dig_h5) / 16384.0 * var))
        * (f64::from(c.dig_h2) / 65536.0
            * (1.0
                + f64::from(c.dig_h6) / 67108864.0
                    * var
                    * (1.0 + f64::from(c.dig_h3) / 67108864.0 * var)));
    let humidity = var * (1.0 - f64::from(c.dig_h1) * var / 524288.0);
    Some(clamp_humidity(humidity))
}

// f64::max ignores a NaN operand, so NaN comes out as 0
fn clamp_humidity(humidity: f64) -> f64 {
    humidity.max(0.0).min(100.0)
}
