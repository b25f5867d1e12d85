use std::convert::TryFrom;
use std::str::FromStr;
use std::time::Duration;

use rocket::config::{Config, ConfigError};

use crate::registers::MeasurementSettings;

pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";
pub const DEFAULT_I2C_ADDRESS: u8 = 0x76;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;
pub const MAX_HISTORY_CAPACITY: usize = 100_000;

/// Application settings taken from the extras of the Rocket configuration
/// (`Rocket.toml` or `ROCKET_*` environment variables).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub i2c_bus: String,
    pub i2c_address: u8,
    /// Zero disables background polling.
    pub poll_interval: Duration,
    pub history_capacity: usize,
    pub measurement: MeasurementSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            i2c_bus: DEFAULT_I2C_BUS.to_string(),
            i2c_address: DEFAULT_I2C_ADDRESS,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            measurement: MeasurementSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let defaults = Settings::default();

        let i2c_bus = optional(config.get_str("i2c_bus"), "i2c_bus")?
            .map(str::to_string)
            .unwrap_or(defaults.i2c_bus);
        let i2c_address = i2c_address(config)?.unwrap_or(defaults.i2c_address);
        let poll_interval = match optional(config.get_int("poll_interval"), "poll_interval")? {
            Some(secs) if secs < 0 => return Err(format!("poll_interval must not be negative, got {}", secs)),
            Some(secs) => Duration::from_secs(secs as u64),
            None => defaults.poll_interval,
        };
        let history_capacity = match optional(config.get_int("history_capacity"), "history_capacity")? {
            Some(n) if n < 0 => return Err(format!("history_capacity must not be negative, got {}", n)),
            Some(n) if n as u64 > MAX_HISTORY_CAPACITY as u64 => {
                return Err(format!(
                    "history_capacity must not exceed {}, got {}",
                    MAX_HISTORY_CAPACITY, n
                ))
            }
            Some(n) => n as usize,
            None => defaults.history_capacity,
        };

        let m = defaults.measurement;
        let oversampling = parsed(config, "oversampling", m.temperature)?;
        let measurement = MeasurementSettings {
            temperature: oversampling,
            pressure: oversampling,
            humidity: oversampling,
            mode: parsed(config, "power_mode", m.mode)?,
            standby: parsed(config, "standby", m.standby)?,
            filter: parsed(config, "filter", m.filter)?,
        };

        Ok(Settings {
            i2c_bus,
            i2c_address,
            poll_interval,
            history_capacity,
            measurement,
        })
    }
}

fn optional<T>(value: Result<T, ConfigError>, name: &str) -> Result<Option<T>, String> {
    match value {
        Ok(v) => Ok(Some(v)),
        Err(ConfigError::Missing(_)) => Ok(None),
        Err(e) => Err(format!("invalid '{}': {}", name, e)),
    }
}

fn parsed<T>(config: &Config, name: &str, default: T) -> Result<T, String>
where
    T: FromStr<Err = String>,
{
    match optional(config.get_str(name), name)? {
        Some(s) => s.parse().map_err(|e| format!("invalid '{}': {}", name, e)),
        None => Ok(default),
    }
}

// accepts 118 as well as "0x76"
fn i2c_address(config: &Config) -> Result<Option<u8>, String> {
    if let Ok(n) = config.get_int("i2c_address") {
        return u8::try_from(n)
            .map(Some)
            .map_err(|_| format!("i2c_address {} is out of range", n));
    }
    match optional(config.get_str("i2c_address"), "i2c_address")? {
        Some(s) => parse_address(s).map(Some),
        None => Ok(None),
    }
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid i2c_address '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use rocket::config::Environment;

    use super::*;
    use crate::registers::{Filter, Oversampling, PowerMode, Standby};

    #[test]
    fn defaults_when_no_extras() {
        let config = Config::build(Environment::Development).finalize().unwrap();

        assert_eq!(Settings::from_config(&config), Ok(Settings::default()));
    }

    #[test]
    fn reads_extras() {
        let config = Config::build(Environment::Development)
            .extra("i2c_bus", "/dev/i2c-3")
            .extra("i2c_address", "0x77")
            .extra("poll_interval", 5i64)
            .extra("history_capacity", 120i64)
            .extra("oversampling", "x4")
            .extra("power_mode", "forced")
            .extra("standby", "500ms")
            .extra("filter", "x2")
            .finalize()
            .unwrap();

        let settings = Settings::from_config(&config).unwrap();

        assert_eq!(settings.i2c_bus, "/dev/i2c-3");
        assert_eq!(settings.i2c_address, 0x77);
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.history_capacity, 120);
        assert_eq!(settings.measurement.humidity, Oversampling::X4);
        assert_eq!(settings.measurement.mode, PowerMode::Forced);
        assert_eq!(settings.measurement.standby, Standby::Ms500);
        assert_eq!(settings.measurement.filter, Filter::X2);
    }

    #[test]
    fn numeric_address() {
        let config = Config::build(Environment::Development)
            .extra("i2c_address", 119i64)
            .finalize()
            .unwrap();

        assert_eq!(Settings::from_config(&config).unwrap().i2c_address, 0x77);
    }

    #[test]
    fn rejects_bad_values() {
        let config = Config::build(Environment::Development)
            .extra("i2c_address", 300i64)
            .finalize()
            .unwrap();
        assert!(Settings::from_config(&config).is_err());

        let config = Config::build(Environment::Development)
            .extra("power_mode", "turbo")
            .finalize()
            .unwrap();
        assert!(Settings::from_config(&config).is_err());

        let config = Config::build(Environment::Development)
            .extra("poll_interval", -1i64)
            .finalize()
            .unwrap();
        assert!(Settings::from_config(&config).is_err());
    }

    #[test]
    fn history_capacity_is_bounded() {
        let config = Config::build(Environment::Development)
            .extra("history_capacity", i64::max_value())
            .finalize()
            .unwrap();
        assert_eq!(
            Settings::from_config(&config),
            Err(format!(
                "history_capacity must not exceed 100000, got {}",
                i64::max_value()
            ))
        );

        let config = Config::build(Environment::Development)
            .extra("history_capacity", MAX_HISTORY_CAPACITY as i64)
            .finalize()
            .unwrap();
        assert_eq!(
            Settings::from_config(&config).unwrap().history_capacity,
            MAX_HISTORY_CAPACITY
        );
    }

    #[test]
    fn address_parsing() {
        assert_eq!(parse_address("0x76"), Ok(0x76));
        assert_eq!(parse_address("118"), Ok(0x76));
        assert!(parse_address("0xZZ").is_err());
    }
}
