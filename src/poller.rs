use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use log::{debug, error, info, warn};

use crate::history::History;
use crate::reading::Reading;
use crate::sensor::{SessionState, Sensor};

/// One device lock shared by the poller and the HTTP handlers; a sample is
/// read and compensated while holding it.
pub type SharedSensor = Arc<Mutex<Box<dyn Sensor + Send>>>;
pub type SharedHistory = Arc<Mutex<History>>;

pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Takes one reading into the history. A sensor that is not ready is
/// initialized again first; if that fails, its error is recorded and no
/// reading is attempted.
pub fn poll_once(sensor: &SharedSensor, history: &SharedHistory) {
    let result = {
        let mut sensor = lock(sensor);
        if sensor.state() != SessionState::Ready {
            if let Err(e) = sensor.initialize() {
                warn!("Sensor initialization failed: {}", e);
                lock(history).record_error(e.to_string());
                return;
            }
        }
        sensor.measure()
    };

    let mut history = lock(history);
    match result {
        Ok(reading) => {
            let reading = Reading::new(Local::now(), reading);
            debug!(
                "Reading: {:.2}°C, {:?} hPa, {:?} %RH",
                reading.temperature, reading.pressure, reading.humidity
            );
            history.record(reading);
        }
        Err(e) => {
            error!("Failed to read sensor: {}", e);
            history.record_error(e.to_string());
        }
    }
}

/// Starts the background poller, or does nothing for a zero interval.
pub fn spawn(sensor: SharedSensor, history: SharedHistory, interval: Duration) -> Option<JoinHandle<()>> {
    if interval == Duration::from_secs(0) {
        info!("Background polling disabled");
        return None;
    }

    info!("Polling sensor every {:?}", interval);
    let handle = thread::Builder::new()
        .name("bme280-poller".into())
        .spawn(move || loop {
            poll_once(&sensor, &history);
            thread::sleep(interval);
        });
    match handle {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("Failed to start poller thread: {}", e);
            None
        }
    }
}
