use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Deserializer};
use tracing::trace;

use crate::monitors::bands::ReferenceBands;

const DEFAULT_DEVICE_URL: &str = "http://192.168.10.107";

/// One tick per day at most, a longer window would span several slots.
const MAX_INTERVAL_MINUTES: u64 = 24 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,

    /// Acceptable (min, max) range per sensor label
    pub bands: ReferenceBands,

    /// Daily extraction slots, `"HH:MM"`
    #[serde(deserialize_with = "deserialize_times")]
    pub extraction_times: Vec<NaiveTime>,

    /// Weekly report slots
    pub reports: Vec<ReportSlot>,

    /// Minutes slept between two ticks of the scheduler
    pub interval_minutes: u64,

    /// Notifications sent per incident before further alerts are suppressed
    pub max_alerts: usize,

    pub storage: StorageConfig,

    pub logging: LogConfig,

    /// Notification channel (optional - alerts are only logged without one)
    pub notifier: Option<Alert>,

    /// External report generator (optional - report slots are only logged without one)
    pub report: Option<ReportConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            bands: ReferenceBands::default(),
            extraction_times: vec![hm(7, 0), hm(12, 0), hm(18, 30)],
            reports: vec![ReportSlot {
                weekday: Weekday::Fri,
                time: hm(17, 30),
            }],
            interval_minutes: 10,
            max_alerts: 3,
            storage: StorageConfig::default(),
            logging: LogConfig::default(),
            notifier: None,
            report: None,
        }
    }
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_minutes == 0 {
            anyhow::bail!("interval_minutes must be greater than 0");
        }

        if self.interval_minutes > MAX_INTERVAL_MINUTES {
            anyhow::bail!(
                "interval_minutes must be at most {MAX_INTERVAL_MINUTES} (got {})",
                self.interval_minutes
            );
        }

        if self.logging.max_lines < 2 {
            anyhow::bail!("logging.max_lines must be at least 2");
        }

        for (sensor, band) in self.bands.iter() {
            if band.min > band.max {
                anyhow::bail!(
                    "reference band for {sensor} is inverted ({} > {})",
                    band.min,
                    band.max
                );
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DEVICE_URL.to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReportSlot {
    pub weekday: Weekday,
    #[serde(deserialize_with = "deserialize_time")]
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the monthly files and the mirror
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: PathBuf,
    pub max_lines: usize,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("log/monitoring.txt"),
            max_lines: 2000,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Pushbullet(Pushbullet),
    Discord(Discord),
    Webhook(Webhook),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pushbullet {
    /// Access token; falls back to `PUSHBULLET_TOKEN` when absent
    pub token: Option<String>,
    #[serde(default = "default_pushbullet_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub command: String,
}

fn default_pushbullet_url() -> String {
    "https://api.pushbullet.com/v2/pushes".to_string()
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day `{raw}`")))
}

fn deserialize_times<'de, D>(deserializer: D) -> Result<Vec<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.iter()
        .map(|time| {
            parse_time(time)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day `{time}`")))
        })
        .collect()
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    let config: Config = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}
