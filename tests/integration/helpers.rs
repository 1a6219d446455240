//! Helper functions for integration tests

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use minilide_monitor::alerts::{NotificationError, Notifier};
use minilide_monitor::config::Config;
use minilide_monitor::daemon::Daemon;
use minilide_monitor::monitors::bands::{ReferenceBand, ReferenceBands};
use minilide_monitor::report::ReportTrigger;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Status page with one card per sensor, the way the device lays them out.
pub fn cards_page(sensors: &[(&str, f64)]) -> String {
    let cards: String = sensors
        .iter()
        .map(|(label, value)| {
            format!(
                "<div class=\"card\"><h3>{label}</h3>\
                 <p class=\"value\">{value:.1} &deg;C</p></div>"
            )
        })
        .collect();
    format!("<html><body><h1>Minilide</h1>{cards}</body></html>")
}

pub fn in_band_page() -> String {
    cards_page(&[("Sensor 1", 21.5), ("Sensor 2", -20.0), ("Sensor 3", -18.0)])
}

pub fn out_of_band_page() -> String {
    cards_page(&[("Sensor 1", 35.0), ("Sensor 2", -20.0), ("Sensor 3", -10.0)])
}

pub async fn serve_page(server: &MockServer, page: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;
}

pub fn test_bands() -> ReferenceBands {
    [
        ("Sensor 1".to_string(), ReferenceBand::new(10.0, 30.0)),
        ("Sensor 2".to_string(), ReferenceBand::new(-30.0, -15.0)),
        ("Sensor 3".to_string(), ReferenceBand::new(-30.0, -15.0)),
    ]
    .into_iter()
    .collect()
}

pub fn test_config(device_url: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.device.url = device_url.to_string();
    config.device.timeout_secs = 1;
    config.bands = test_bands();
    config.storage.data_dir = dir.join("data");
    config.logging.path = dir.join("log").join("monitoring.txt");
    config
}

// 2025-03-14 is a Friday
pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Always fails, like a channel that is down.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _title: &str, _body: &str) -> Result<(), NotificationError> {
        Err(NotificationError::Status(500, "down".to_string()))
    }
}

#[derive(Clone, Default)]
pub struct RecordingReport {
    pub triggered: Arc<AtomicUsize>,
}

impl RecordingReport {
    pub fn count(&self) -> usize {
        self.triggered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportTrigger for RecordingReport {
    async fn trigger(&self) -> anyhow::Result<()> {
        self.triggered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn daemon_with(
    config: &Config,
    notifier: &RecordingNotifier,
    report: &RecordingReport,
) -> Daemon {
    Daemon::new(config, Box::new(notifier.clone()), Box::new(report.clone())).unwrap()
}
