//! File layout of the monthly store
//!
//! Every file starts with the header `timestamp,capteur,temperature`. Files
//! written by older tools may use other column names or another date format,
//! so reading goes through [`ColumnMap`] and [`parse_timestamp`], which accept
//! the known variants and drop rows they cannot make sense of.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use super::error::{StorageError, StorageResult};
use crate::Reading;

/// Canonical header, in column order
pub const HEADER: [&str; 3] = ["timestamp", "capteur", "temperature"];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_COLUMNS: &[&str] = &[
    "timestamp",
    "time",
    "date",
    "datetime",
    "date_time",
    "horodatage",
];
const SENSOR_COLUMNS: &[&str] = &["capteur", "sensor", "sensor_label", "label", "name", "sonde"];
const TEMPERATURE_COLUMNS: &[&str] = &[
    "temperature",
    "température",
    "temp",
    "temperature_c",
    "value",
    "valeur",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Calendar month a monthly file covers, displayed as `MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(at: &NaiveDateTime) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        Self::of(at) == *self
    }

    pub fn file_name(&self) -> String {
        format!("temperatures_{self}.csv")
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

impl FromStr for MonthKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidMonthKey(s.to_string());
        let (month, year) = s.trim().split_once('-').ok_or_else(invalid)?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        MonthKey::new(year, month).ok_or_else(invalid)
    }
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses the date-time formats found in monthly files, including RFC 3339
/// and bare dates (taken as midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_temperature(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches("°C")
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Positions of the three canonical columns in a file's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: usize,
    pub sensor: usize,
    pub temperature: usize,
}

impl ColumnMap {
    pub fn resolve(headers: &csv::StringRecord) -> StorageResult<Self> {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |synonyms: &[&str], column: &'static str| {
            synonyms
                .iter()
                .find_map(|synonym| names.iter().position(|name| name == synonym))
                .ok_or(StorageError::MissingColumn(column))
        };

        Ok(Self {
            timestamp: find(TIMESTAMP_COLUMNS, HEADER[0])?,
            sensor: find(SENSOR_COLUMNS, HEADER[1])?,
            temperature: find(TEMPERATURE_COLUMNS, HEADER[2])?,
        })
    }

    /// Reads one row, `None` when its timestamp or temperature is unusable.
    pub fn parse(&self, record: &csv::StringRecord) -> Option<Reading> {
        let timestamp = parse_timestamp(record.get(self.timestamp)?)?;
        let sensor = record.get(self.sensor)?.trim();
        let temperature = parse_temperature(record.get(self.temperature)?)?;
        Some(Reading::new(timestamp, sensor, temperature))
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}
