pub mod alerts;
pub mod config;
pub mod daemon;
pub mod device;
pub mod discord;
pub mod extractor;
pub mod logging;
pub mod monitors;
pub mod report;
pub mod schedule;
pub mod storage;
pub mod util;

use chrono::NaiveDateTime;

/// One temperature observation as it is persisted in the monthly store.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub sensor: String,
    pub temperature: f64,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, sensor: impl Into<String>, temperature: f64) -> Self {
        Self {
            timestamp,
            sensor: sensor.into(),
            temperature,
        }
    }
}

/// Label used for the sensor at `index` when the page does not name it.
pub fn positional_label(index: usize) -> String {
    format!("Sensor {}", index + 1)
}

/// Formats a temperature the way the device page and the stored history do:
/// integral values keep one decimal (`-18.0`), others are printed as is.
pub fn format_temperature(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
