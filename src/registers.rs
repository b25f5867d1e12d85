use std::str::FromStr;

pub const CHIP_ID: u8 = 0x60;

pub const REG_CHIP_ID: u8 = 0xD0;
pub const REG_CALIB_T1: u8 = 0x88;
pub const REG_CALIB_T2: u8 = 0x8A;
pub const REG_CALIB_T3: u8 = 0x8C;
pub const REG_CALIB_P1: u8 = 0x8E;
pub const REG_CALIB_P2: u8 = 0x90;
pub const REG_CALIB_H1: u8 = 0xA1;
pub const REG_CALIB_H2: u8 = 0xE1;
pub const REG_CALIB_H3: u8 = 0xE3;
pub const REG_CALIB_H4: u8 = 0xE4;
pub const REG_CALIB_H6: u8 = 0xE7;
pub const REG_CTRL_HUM: u8 = 0xF2;
pub const REG_STATUS: u8 = 0xF3;
pub const REG_CTRL_MEAS: u8 = 0xF4;
pub const REG_CONFIG: u8 = 0xF5;
pub const REG_DATA: u8 = 0xF7;

pub const DATA_LEN: usize = 8;
pub const STATUS_MEASURING: u8 = 0x08;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Oversampling {
    Skipped,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    fn bits(self) -> u8 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 3,
            Oversampling::X8 => 4,
            Oversampling::X16 => 5,
        }
    }
}

impl FromStr for Oversampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skipped" => Ok(Oversampling::Skipped),
            "x1" => Ok(Oversampling::X1),
            "x2" => Ok(Oversampling::X2),
            "x4" => Ok(Oversampling::X4),
            "x8" => Ok(Oversampling::X8),
            "x16" => Ok(Oversampling::X16),
            _ => Err(format!("unknown oversampling '{}'", s)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PowerMode {
    Sleep,
    Forced,
    Normal,
}

impl PowerMode {
    fn bits(self) -> u8 {
        match self {
            PowerMode::Sleep => 0b00,
            PowerMode::Forced => 0b01,
            PowerMode::Normal => 0b11,
        }
    }
}

impl FromStr for PowerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sleep" => Ok(PowerMode::Sleep),
            "forced" => Ok(PowerMode::Forced),
            "normal" => Ok(PowerMode::Normal),
            _ => Err(format!("unknown power mode '{}'", s)),
        }
    }
}

/// Inactive time between conversions in normal mode.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Standby {
    Ms0_5,
    Ms62_5,
    Ms125,
    Ms250,
    Ms500,
    Ms1000,
    Ms10,
    Ms20,
}

impl Standby {
    fn bits(self) -> u8 {
        match self {
            Standby::Ms0_5 => 0,
            Standby::Ms62_5 => 1,
            Standby::Ms125 => 2,
            Standby::Ms250 => 3,
            Standby::Ms500 => 4,
            Standby::Ms1000 => 5,
            Standby::Ms10 => 6,
            Standby::Ms20 => 7,
        }
    }
}

impl FromStr for Standby {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.5ms" => Ok(Standby::Ms0_5),
            "10ms" => Ok(Standby::Ms10),
            "20ms" => Ok(Standby::Ms20),
            "62.5ms" => Ok(Standby::Ms62_5),
            "125ms" => Ok(Standby::Ms125),
            "250ms" => Ok(Standby::Ms250),
            "500ms" => Ok(Standby::Ms500),
            "1000ms" => Ok(Standby::Ms1000),
            _ => Err(format!("unknown standby time '{}'", s)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Filter {
    Off,
    X2,
    X4,
    X8,
    X16,
}

impl Filter {
    fn bits(self) -> u8 {
        match self {
            Filter::Off => 0,
            Filter::X2 => 1,
            Filter::X4 => 2,
            Filter::X8 => 3,
            Filter::X16 => 4,
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Filter::Off),
            "x2" => Ok(Filter::X2),
            "x4" => Ok(Filter::X4),
            "x8" => Ok(Filter::X8),
            "x16" => Ok(Filter::X16),
            _ => Err(format!("unknown filter coefficient '{}'", s)),
        }
    }
}

/// Oversampling, power mode and timing written to the control registers
/// before any raw data is requested.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeasurementSettings {
    pub temperature: Oversampling,
    pub pressure: Oversampling,
    pub humidity: Oversampling,
    pub mode: PowerMode,
    pub standby: Standby,
    pub filter: Filter,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        MeasurementSettings {
            temperature: Oversampling::X1,
            pressure: Oversampling::X1,
            humidity: Oversampling::X1,
            mode: PowerMode::Normal,
            standby: Standby::Ms1000,
            filter: Filter::Off,
        }
    }
}

impl MeasurementSettings {
    pub fn ctrl_hum(&self) -> u8 {
        self.humidity.bits() & 0x07
    }

    pub fn ctrl_meas(&self) -> u8 {
        (self.temperature.bits() << 5) | (self.pressure.bits() << 2) | self.mode.bits()
    }

    // spi3w_en stays 0
    pub fn config(&self) -> u8 {
        (self.standby.bits() << 5) | (self.filter.bits() << 2)
    }
}
