use std::fmt;

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, info};
use serde::Serialize;

use crate::bus::RegisterBus;
use crate::calibration::CalibrationData;
use crate::compensation::{compensate, CompensatedReading, CompensationState, RawSample};
use crate::error::Error;
use crate::registers::*;

const CONVERSION_POLL_MS: u8 = 2;
// worst case conversion at x16 oversampling on all channels is ~113 ms
const CONVERSION_POLL_LIMIT: usize = 100;

#[derive(Serialize, Debug, Copy, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Bus opened, control registers not written yet.
    Unconfigured,
    /// Control registers written, no calibration loaded.
    Configured,
    /// Calibration loaded, measurements allowed.
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionState::Unconfigured => write!(f, "unconfigured"),
            SessionState::Configured => write!(f, "configured"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// A session with one BME280. Owns the bus, the calibration and the
/// `t_fine` of the last sample; `measure` takes `&mut self` so a sample is
/// always read and compensated as one unit.
pub struct Bme280<B, D> {
    bus: B,
    delay: D,
    settings: MeasurementSettings,
    calibration: Option<CalibrationData>,
    compensation: CompensationState,
    state: SessionState,
}

impl<B, D> Bme280<B, D>
where
    B: RegisterBus,
    D: DelayMs<u8>,
{
    pub fn new(bus: B, delay: D, settings: MeasurementSettings) -> Self {
        Bme280 {
            bus,
            delay,
            settings,
            calibration: None,
            compensation: CompensationState::new(),
            state: SessionState::Unconfigured,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Verifies the chip id and writes the control registers. Mode goes last
    /// because `config` writes may be ignored in normal mode.
    pub fn configure(&mut self) -> Result<(), Error<B::Error>> {
        if self.state == SessionState::Closed {
            return Err(Error::NotReady(self.state));
        }

        let chip_id = self.bus.read_register(REG_CHIP_ID).map_err(Error::Bus)?;
        if chip_id != CHIP_ID {
            return Err(Error::UnknownChip(chip_id));
        }
        debug!("Got chip id: {:#x}", chip_id);

        let ctrl_hum = self.settings.ctrl_hum();
        let config = self.settings.config();
        let ctrl_meas = self.settings.ctrl_meas();
        debug!(
            "Writing ctrl_hum {:#010b}, config {:#010b}, ctrl_meas {:#010b}",
            ctrl_hum, config, ctrl_meas
        );
        self.bus.write_register(REG_CTRL_HUM, ctrl_hum).map_err(Error::Bus)?;
        self.bus.write_register(REG_CONFIG, config).map_err(Error::Bus)?;
        self.bus.write_register(REG_CTRL_MEAS, ctrl_meas).map_err(Error::Bus)?;

        if self.state == SessionState::Unconfigured {
            self.state = SessionState::Configured;
        }
        Ok(())
    }

    /// Loads the trim registers. A failed load drops any calibration the
    /// session held and takes it back to `Configured`.
    pub fn load_calibration(&mut self) -> Result<(), Error<B::Error>> {
        match self.state {
            SessionState::Configured | SessionState::Ready => {}
            state => return Err(Error::NotReady(state)),
        }

        match CalibrationData::load(&mut self.bus) {
            Ok(calibration) => {
                debug!("Got calibration data: {:?}", calibration);
                self.calibration = Some(calibration);
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.calibration = None;
                self.compensation = CompensationState::new();
                self.state = SessionState::Configured;
                Err(e.into())
            }
        }
    }

    pub fn initialize(&mut self) -> Result<(), Error<B::Error>> {
        info!("Initializing BME280 ...");
        self.configure()?;
        self.load_calibration()?;
        info!("BME280 ready");
        Ok(())
    }

    /// Reads the data registers in one burst.
    pub fn read_raw(&mut self) -> Result<RawSample, Error<B::Error>> {
        if self.settings.mode == PowerMode::Forced {
            self.trigger_conversion()?;
        }
        let mut data = [0u8; DATA_LEN];
        self.bus.read_registers(REG_DATA, &mut data).map_err(Error::Bus)?;
        Ok(RawSample::from_bytes(&data))
    }

    fn trigger_conversion(&mut self) -> Result<(), Error<B::Error>> {
        self.bus
            .write_register(REG_CTRL_MEAS, self.settings.ctrl_meas())
            .map_err(Error::Bus)?;
        for _ in 0..CONVERSION_POLL_LIMIT {
            self.delay.delay_ms(CONVERSION_POLL_MS);
            let status = self.bus.read_register(REG_STATUS).map_err(Error::Bus)?;
            if status & STATUS_MEASURING == 0 {
                return Ok(());
            }
        }
        Err(Error::ConversionTimeout)
    }

    /// Burst read followed by temperature, then pressure and humidity
    /// compensation of that same sample.
    pub fn measure(&mut self) -> Result<CompensatedReading, Error<B::Error>> {
        let calibration = match (self.state, self.calibration) {
            (SessionState::Ready, Some(calibration)) => calibration,
            (state, _) => return Err(Error::NotReady(state)),
        };

        let raw = self.read_raw()?;
        debug!("Raw sample: {:?}", raw);
        compensate(&raw, &calibration, &mut self.compensation).ok_or(Error::TemperatureSkipped)
    }

    /// Ends the session. The calibration is discarded and every later
    /// operation fails with `NotReady(Closed)`.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!("Closing BME280 session");
        }
        self.state = SessionState::Closed;
        self.calibration = None;
        self.compensation = CompensationState::new();
    }
}

/// Object-safe view of a sensor session used by the server and poller, with
/// the bus error rendered to text.
pub trait Sensor {
    fn initialize(&mut self) -> Result<(), Error<String>>;

    fn measure(&mut self) -> Result<CompensatedReading, Error<String>>;

    fn state(&self) -> SessionState;

    fn close(&mut self);
}

impl<B, D> Sensor for Bme280<B, D>
where
    B: RegisterBus,
    B::Error: fmt::Debug,
    D: DelayMs<u8>,
{
    fn initialize(&mut self) -> Result<(), Error<String>> {
        Bme280::initialize(self).map_err(|e| e.map_bus(|bus| format!("{:?}", bus)))
    }

    fn measure(&mut self) -> Result<CompensatedReading, Error<String>> {
        Bme280::measure(self).map_err(|e| e.map_bus(|bus| format!("{:?}", bus)))
    }

    fn state(&self) -> SessionState {
        Bme280::state(self)
    }

    fn close(&mut self) {
        Bme280::close(self)
    }
}
