//! Append-only monthly files and the current-month mirror
//!
//! Readings go to `<data_dir>/temperatures_MM-YYYY.csv`, one file per
//! calendar month. After each append the month is read back from disk and
//! copied wholesale to `<data_dir>/temperatures.csv`, the mirror consumed by
//! the dashboard. The monthly file is the source of truth: a failed mirror
//! refresh is logged and leaves the appended rows in place.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, error, instrument, trace, warn};

use super::error::StorageResult;
use super::schema::{ColumnMap, HEADER, MonthKey, format_timestamp};
use crate::{Reading, format_temperature};

pub const MIRROR_FILE_NAME: &str = "temperatures.csv";

/// Result of one append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub path: PathBuf,
    pub rows: usize,
    /// The file was absent or empty and got a header
    pub created: bool,
}

/// Result of an append followed by a mirror refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub append: AppendOutcome,
    /// Rows read back from the monthly file, `None` when it could not be read
    pub month_rows: Option<usize>,
    /// Rows written to the mirror, `None` when the mirror could not be written
    pub mirror_rows: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MonthlyStore {
    data_dir: PathBuf,
}

impl MonthlyStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn month_path(&self, key: MonthKey) -> PathBuf {
        self.data_dir.join(key.file_name())
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.data_dir.join(MIRROR_FILE_NAME)
    }

    /// Appends `readings` to the file of the month containing `at`. The
    /// readings are expected to carry `at` as their timestamp.
    #[instrument(skip(self, readings), fields(rows = readings.len()))]
    pub fn append(&self, readings: &[Reading], at: NaiveDateTime) -> StorageResult<AppendOutcome> {
        let key = MonthKey::of(&at);
        let path = self.month_path(key);
        fs::create_dir_all(&self.data_dir)?;

        let existing_len = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        let created = existing_len == 0;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        if !created && !ends_with_newline(&mut file)? {
            // a previous write stopped mid-row; start on a fresh line
            warn!("{}: last row is incomplete", path.display());
            file.write_all(b"\n")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if created {
            writer.write_record(HEADER)?;
        }

        for reading in readings {
            if !key.contains(&reading.timestamp) {
                warn!(
                    "reading from {} stored in {key}",
                    format_timestamp(&reading.timestamp)
                );
            }
            writer.write_record([
                format_timestamp(&reading.timestamp),
                reading.sensor.clone(),
                format_temperature(reading.temperature),
            ])?;
        }
        writer.flush()?;

        debug!("{}: appended {} rows", path.display(), readings.len());

        Ok(AppendOutcome {
            path,
            rows: readings.len(),
            created,
        })
    }

    /// Reads every usable row of a month, in file order.
    pub fn read_month(&self, key: MonthKey) -> StorageResult<Vec<Reading>> {
        read_readings(&self.month_path(key))
    }

    /// Rewrites the mirror from the durable monthly file.
    #[instrument(skip(self))]
    pub fn refresh_mirror(&self, key: MonthKey) -> StorageResult<usize> {
        let readings = self.read_month(key)?;
        write_readings(&self.mirror_path(), &readings)?;
        trace!("mirror refreshed with {} rows", readings.len());
        Ok(readings.len())
    }

    /// Appends a batch and brings the mirror up to date.
    ///
    /// Only the append can fail this call. When the monthly file cannot be
    /// read back, the mirror is rebuilt from `readings` alone; when the mirror
    /// cannot be written, the error is logged.
    pub fn record(&self, readings: &[Reading], at: NaiveDateTime) -> StorageResult<RecordOutcome> {
        let append = self.append(readings, at)?;
        let key = MonthKey::of(&at);

        let (month_rows, mirror_source) = match self.read_month(key) {
            Ok(month) => (Some(month.len()), month),
            Err(e) => {
                warn!(
                    "could not read back {}: {e}, mirroring the new batch only",
                    append.path.display()
                );
                (None, readings.to_vec())
            }
        };

        let mirror_rows = match write_readings(&self.mirror_path(), &mirror_source) {
            Ok(()) => Some(mirror_source.len()),
            Err(e) => {
                error!("failed to refresh mirror {}: {e}", self.mirror_path().display());
                None
            }
        };

        Ok(RecordOutcome {
            append,
            month_rows,
            mirror_rows,
        })
    }

    /// Reads a month, falling back to the mirror while the monthly file does
    /// not exist yet (first hours of a month).
    pub fn load_month_or_mirror(&self, key: MonthKey) -> StorageResult<Vec<Reading>> {
        let path = self.month_path(key);
        let has_month = fs::metadata(&path).map(|meta| meta.len() > 0).unwrap_or(false);

        if has_month {
            return read_readings(&path);
        }

        warn!("{} not found, falling back to {}", path.display(), self.mirror_path().display());
        read_readings(&self.mirror_path())
    }
}

/// Tolerant reader for monthly and mirror files. Column names may be any
/// known synonym; rows with an unusable timestamp or temperature are dropped.
pub fn read_readings(path: &Path) -> StorageResult<Vec<Reading>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let columns = ColumnMap::resolve(reader.headers()?)?;

    let mut readings = Vec::new();
    for (index, record) in reader.records().enumerate() {
        // header is line 1
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                trace!("{}:{line}: unreadable row ({e})", path.display());
                continue;
            }
        };

        match columns.parse(&record) {
            Some(reading) => readings.push(reading),
            None => trace!("{}:{line}: dropping row {record:?}", path.display()),
        }
    }

    Ok(readings)
}

/// Writes a complete file (header + rows) through a temporary file, so
/// readers never observe a half-written file.
fn write_readings(path: &Path, readings: &[Reading]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        writer.write_record(HEADER)?;
        for reading in readings {
            writer.write_record([
                format_timestamp(&reading.timestamp),
                reading.sensor.clone(),
                format_temperature(reading.temperature),
            ])?;
        }
        writer.flush()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
