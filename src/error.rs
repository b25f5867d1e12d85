use std::fmt;

use crate::sensor::SessionState;

/// Failure while reading the factory trim registers. Nothing is kept from a
/// load that ends in one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError<E> {
    /// The bus reported an error for this register.
    Read { register: u8, source: E },
    /// The read succeeded but the contents look like an unpowered or missing
    /// chip (all zeros, all ones, or a zero scale coefficient).
    Absent { register: u8 },
}

impl<E> CalibrationError<E> {
    #[cfg(test)]
    pub fn register(&self) -> u8 {
        match self {
            CalibrationError::Read { register, .. } => *register,
            CalibrationError::Absent { register } => *register,
        }
    }

    pub fn map_bus<F, G: FnOnce(E) -> F>(self, f: G) -> CalibrationError<F> {
        match self {
            CalibrationError::Read { register, source } => CalibrationError::Read {
                register,
                source: f(source),
            },
            CalibrationError::Absent { register } => CalibrationError::Absent { register },
        }
    }
}

impl<E: fmt::Debug> fmt::Display for CalibrationError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CalibrationError::Read { register, source } => write!(
                f,
                "failed to read calibration register {:#04x}: {:?}",
                register, source
            ),
            CalibrationError::Absent { register } => write!(
                f,
                "calibration at register {:#04x} is absent",
                register
            ),
        }
    }
}

/// Errors of a sensor session, generic over the bus error `E`.
#[derive(Debug, Clone, PartialEq)]
pub enum Error<E> {
    /// Transport failure reading or writing a register.
    Bus(E),
    Calibration(CalibrationError<E>),
    /// Chip id register did not identify a BME280.
    UnknownChip(u8),
    /// The session is not in a state that allows the requested operation.
    NotReady(SessionState),
    /// Forced-mode conversion did not finish in time.
    ConversionTimeout,
    /// Temperature channel was skipped, so no reading can be compensated.
    TemperatureSkipped,
}

impl<E> Error<E> {
    /// Converts the bus error type, used to erase the concrete bus at the
    /// server boundary.
    pub fn map_bus<F, G: FnOnce(E) -> F>(self, f: G) -> Error<F> {
        match self {
            Error::Bus(e) => Error::Bus(f(e)),
            Error::Calibration(e) => Error::Calibration(e.map_bus(f)),
            Error::UnknownChip(id) => Error::UnknownChip(id),
            Error::NotReady(state) => Error::NotReady(state),
            Error::ConversionTimeout => Error::ConversionTimeout,
            Error::TemperatureSkipped => Error::TemperatureSkipped,
        }
    }
}

impl<E> From<CalibrationError<E>> for Error<E> {
    fn from(e: CalibrationError<E>) -> Self {
        Error::Calibration(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::Calibration(e) => write!(f, "{}", e),
            Error::UnknownChip(id) => write!(
                f,
                "found unknown chip id {:#04x}, expected {:#04x}",
                id,
                crate::registers::CHIP_ID
            ),
            Error::NotReady(state) => write!(f, "sensor is not ready (state: {})", state),
            Error::ConversionTimeout => write!(f, "forced conversion did not complete"),
            Error::TemperatureSkipped => write!(f, "temperature measurement was skipped"),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for Error<E> {}
