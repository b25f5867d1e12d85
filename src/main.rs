#![feature(proc_macro_hygiene, decl_macro)]

#[macro_use]
extern crate rocket;

mod bus;
mod calibration;
mod compensation;
mod error;
mod history;
mod poller;
mod reading;
mod registers;
mod sensor;
mod settings;

use std::sync::{Arc, Mutex};

use chrono::Local;
use linux_embedded_hal::{Delay, I2cdev};
use log::{error, info, warn};
use rocket::fairing::AdHoc;
use rocket::http::Status;
use rocket::response::status;
use rocket::{Request, Rocket, State};
use rocket_contrib::json::Json;
use serde::Serialize;

use bus::I2cBus;
use history::History;
use poller::{lock, SharedHistory, SharedSensor};
use reading::Reading;
use sensor::{Bme280, SessionState, Sensor};
use settings::Settings;

#[derive(Serialize, Debug)]
struct ApiError {
    error: String,
}

type ApiResult<T> = Result<Json<T>, status::Custom<Json<ApiError>>>;

fn api_error(status: Status, message: String) -> status::Custom<Json<ApiError>> {
    status::Custom(status, Json(ApiError { error: message }))
}

#[derive(Serialize, Debug)]
struct StationStatus {
    sensor_state: SessionState,
    data_points: usize,
    capacity: usize,
    last_error: Option<String>,
    i2c_bus: String,
    i2c_address: String,
}

#[get("/measure")]
fn measure(sensor: State<SharedSensor>) -> ApiResult<Reading> {
    let result = lock(&sensor).measure();

    match result {
        Ok(reading) => Ok(Json(Reading::new(Local::now(), reading))),
        Err(e) => {
            warn!("On-demand measurement failed: {}", e);
            Err(api_error(Status::ServiceUnavailable, e.to_string()))
        }
    }
}

#[get("/api/latest")]
fn latest(history: State<SharedHistory>) -> ApiResult<Reading> {
    match lock(&history).latest() {
        Some(reading) => Ok(Json(*reading)),
        None => Err(api_error(Status::NotFound, "no reading available yet".to_string())),
    }
}

#[get("/api/history")]
fn api_history(history: State<SharedHistory>) -> Json<Vec<Reading>> {
    Json(lock(&history).snapshot())
}

#[get("/data")]
fn data(history: State<SharedHistory>) -> Json<Vec<Reading>> {
    api_history(history)
}

#[get("/api/status")]
fn api_status(
    sensor: State<SharedSensor>,
    history: State<SharedHistory>,
    settings: State<Settings>,
) -> Json<StationStatus> {
    let sensor_state = lock(&sensor).state();
    let history = lock(&history);

    Json(StationStatus {
        sensor_state,
        data_points: history.len(),
        capacity: history.capacity(),
        last_error: history.last_error().map(str::to_string),
        i2c_bus: settings.i2c_bus.clone(),
        i2c_address: format!("{:#04x}", settings.i2c_address),
    })
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ApiError> {
    Json(ApiError {
        error: format!("no route for {}", req.uri()),
    })
}

#[catch(500)]
fn internal_error() -> Json<ApiError> {
    Json(ApiError {
        error: "Internal server error".to_string(),
    })
}

fn mount(rocket: Rocket, sensor: SharedSensor, history: SharedHistory, settings: Settings) -> Rocket {
    rocket
        .mount("/", routes![measure, latest, api_history, data, api_status])
        .register(catchers![not_found, internal_error])
        .manage(sensor)
        .manage(history)
        .manage(settings)
}

fn rocket() -> Rocket {
    rocket::ignite().attach(AdHoc::on_attach("BME280 sensor", |rocket| {
        let settings = match Settings::from_config(rocket.config()) {
            Ok(settings) => settings,
            Err(e) => {
                error!("Invalid configuration: {}", e);
                return Err(rocket);
            }
        };

        let dev = match I2cdev::new(&settings.i2c_bus) {
            Ok(dev) => dev,
            Err(e) => {
                error!("Failed to open I2C bus {}: {}", settings.i2c_bus, e);
                return Err(rocket);
            }
        };
        info!("Opened {} at address {:#04x}", settings.i2c_bus, settings.i2c_address);

        let mut bme280 = Bme280::new(
            I2cBus::new(dev, settings.i2c_address),
            Delay,
            settings.measurement,
        );
        if let Err(e) = bme280.initialize() {
            warn!("Sensor initialization failed, the poller will retry: {}", e);
        }

        let sensor: Box<dyn Sensor + Send> = Box::new(bme280);
        let sensor: SharedSensor = Arc::new(Mutex::new(sensor));
        let history: SharedHistory = Arc::new(Mutex::new(History::new(settings.history_capacity)));
        poller::spawn(sensor.clone(), history.clone(), settings.poll_interval);

        Ok(mount(rocket, sensor, history, settings))
    }))
}

/// Ends the session behind the server once it stops serving.
fn shutdown(sensor: Option<&SharedSensor>) {
    if let Some(sensor) = sensor {
        lock(sensor).close();
    }
}

fn main() {
    let rocket = rocket();
    let sensor = rocket.state::<SharedSensor>().cloned();
    let err = rocket.launch();
    error!("Launch failed: {}", err);
    shutdown(sensor.as_ref());
}
