use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::compensation::CompensatedReading;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Local>,
    pub temperature: f64,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    /// g/m³, present whenever humidity is.
    pub absolute_humidity: Option<f64>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Local>, reading: CompensatedReading) -> Self {
        Reading {
            timestamp,
            temperature: round2(reading.temperature),
            pressure: reading.pressure.map(round2),
            humidity: reading.humidity.map(round2),
            absolute_humidity: reading
                .humidity
                .map(|rh| round2(rel_humidity_to_abs_humidity(reading.temperature, rh))),
        }
    }
}

pub fn rel_humidity_to_abs_humidity(temp: f64, rel_humidity: f64) -> f64 {
    // saturation vapour pressure in hPa, Magnus formula
    let e = 6.1078 * 10f64.powf((7.5 * temp) / (temp + 237.3));
    let a = (217.0 * e) / (temp + 273.15);
    a * (rel_humidity / 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
