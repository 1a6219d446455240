//! Per-sensor statistics over a set of readings (used by `--summary`)

use std::collections::BTreeMap;

use crate::Reading;

#[derive(Debug, Clone, PartialEq)]
pub struct SensorSummary {
    pub sensor: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    /// Rounded to two decimals
    pub mean: f64,
    /// Value of the most recent reading
    pub last: f64,
}

/// Summarizes readings per sensor. Sensors are ordered by the number in their
/// label (`Sensor 2` before `Sensor 10`), unnumbered labels last.
pub fn summarize(readings: &[Reading]) -> Vec<SensorSummary> {
    let mut by_sensor: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        by_sensor.entry(reading.sensor.as_str()).or_default().push(reading);
    }

    let mut summaries: Vec<SensorSummary> = by_sensor
        .into_iter()
        .map(|(sensor, mut rows)| {
            rows.sort_by_key(|reading| reading.timestamp);
            let values: Vec<f64> = rows.iter().map(|reading| reading.temperature).collect();
            let sum: f64 = values.iter().sum();
            let mean = sum / values.len() as f64;

            SensorSummary {
                sensor: sensor.to_string(),
                count: values.len(),
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                mean: (mean * 100.0).round() / 100.0,
                last: values.last().copied().unwrap_or(f64::NAN),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        sensor_number(&a.sensor)
            .cmp(&sensor_number(&b.sensor))
            .then_with(|| a.sensor.cmp(&b.sensor))
    });
    summaries
}

fn sensor_number(sensor: &str) -> u64 {
    let digits: String = sensor
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(u64::MAX)
}
