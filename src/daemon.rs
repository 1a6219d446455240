//! The polling loop: one tick per interval, an extraction cycle when an
//! extraction slot is due, a report launch when a report slot is due.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info, instrument, warn};

use crate::Reading;
use crate::alerts::{ALERT_TITLE, AlertManager, NotificationError, Notifier};
use crate::config::Config;
use crate::device::DeviceClient;
use crate::extractor::{extract, resolve_labels};
use crate::logging::rotate_log;
use crate::monitors::bands::{AlertDecision, AlertEngine, AlertState};
use crate::report::{self, ReportTrigger};
use crate::schedule::{Schedule, ScheduleState};
use crate::storage::{MonthlyStore, RecordOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    /// Device unreachable, timed out or answered with an error status
    Network(String),

    /// The page held no temperature
    Parse(String),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::Network(msg) => write!(f, "network error: {}", msg),
            CycleError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CycleError {}

/// Everything the daemon carries from one tick to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaemonState {
    pub alerts: AlertState,
    pub schedule: ScheduleState,
}

/// Result of a successful extraction cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub readings: Vec<Reading>,
    /// `None` when the batch could not be appended
    pub stored: Option<RecordOutcome>,
    pub decision: AlertDecision,
}

/// What a tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub extraction: Option<Result<CycleReport, CycleError>>,
    pub report_slot: Option<NaiveDateTime>,
    pub log_lines_removed: Option<usize>,
}

pub struct Daemon {
    device: DeviceClient,
    store: MonthlyStore,
    engine: AlertEngine,
    schedule: Schedule,
    notifier: Box<dyn Notifier>,
    reporter: Box<dyn ReportTrigger>,
    log_path: PathBuf,
    max_log_lines: usize,
    interval: Duration,
    state: DaemonState,
}

impl Daemon {
    pub fn new(
        config: &Config,
        notifier: Box<dyn Notifier>,
        reporter: Box<dyn ReportTrigger>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            device: DeviceClient::new(&config.device)?,
            store: MonthlyStore::new(config.storage.data_dir.clone()),
            engine: AlertEngine::new(config.bands.clone(), config.max_alerts),
            schedule: Schedule::from_config(config),
            notifier,
            reporter,
            log_path: config.logging.path.clone(),
            max_log_lines: config.logging.max_lines,
            interval: config.tick_interval(),
            state: DaemonState::default(),
        })
    }

    /// Daemon wired to the notification channel and report command of the
    /// configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let notifier = Box::new(AlertManager::new(config.notifier.clone()));
        let reporter = report::from_config(config.report.as_ref());
        Self::new(config, notifier, reporter)
    }

    pub fn state(&self) -> &DaemonState {
        &self.state
    }

    /// Runs forever: tick, then sleep for the configured interval.
    pub async fn run(&mut self) {
        info!(
            "Monitoring started ({}, every {} s).",
            self.device.url(),
            self.interval.as_secs()
        );
        info!(
            "{} reference bands, at most {} alerts per incident, data in {}.",
            self.engine.bands().len(),
            self.engine.max_alerts(),
            self.store.data_dir().display()
        );

        loop {
            let now = Local::now().naive_local();
            self.tick(now).await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One immediate extraction cycle, independent of the schedule.
    pub async fn run_once(&mut self) -> Result<CycleReport, CycleError> {
        let now = Local::now().naive_local();
        let result = self.run_cycle(now).await;
        if let Err(e) = &result {
            error!("Extraction failed: {e}");
        }
        result
    }

    /// Housekeeping, then the extraction and report slots due at `now`.
    pub async fn tick(&mut self, now: NaiveDateTime) -> TickReport {
        let log_lines_removed = match rotate_log(&self.log_path, self.max_log_lines, now) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("could not rotate {}: {e}", self.log_path.display());
                None
            }
        };

        let extraction = match self.schedule.poll_extraction(now, &mut self.state.schedule) {
            Some(slot) => {
                info!("Scheduled extraction ({}).", slot.format("%H:%M"));
                let result = self.run_cycle(now).await;
                if let Err(e) = &result {
                    error!("Extraction failed: {e}");
                }
                Some(result)
            }
            None => None,
        };

        let report_slot = self.schedule.poll_report(now, &mut self.state.schedule);
        if let Some(slot) = report_slot {
            info!("Weekly report slot ({}).", slot.format("%A %H:%M"));
            if let Err(e) = self.reporter.trigger().await {
                error!("Report generation failed: {e}");
            }
        }

        TickReport {
            extraction,
            report_slot,
            log_lines_removed,
        }
    }

    /// fetch → extract → store → alert
    ///
    /// A network or parse failure leaves the files and the alert state
    /// untouched. A storage failure is logged and alerting still runs.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self, now: NaiveDateTime) -> Result<CycleReport, CycleError> {
        let page = self.device.fetch().await?;

        let extracted = extract(&page);
        if extracted.is_empty() {
            return Err(CycleError::Parse(
                "no temperature found on the status page".to_string(),
            ));
        }

        let readings = resolve_labels(&extracted, now);
        info!("{} temperatures extracted.", readings.len());
        for reading in &readings {
            debug!("{}: {}", reading.sensor, reading.temperature);
        }

        let stored = match self.store.record(&readings, now) {
            Ok(outcome) => {
                info!(
                    "Data saved to {} ({} rows).",
                    outcome.append.path.display(),
                    outcome.append.rows
                );
                Some(outcome)
            }
            Err(e) => {
                error!("Failed to save readings: {e}");
                None
            }
        };

        let decision = self.engine.evaluate(&readings, &mut self.state.alerts);
        if let AlertDecision::Notify(body) = &decision {
            self.notify(body).await;
        }

        Ok(CycleReport {
            readings,
            stored,
            decision,
        })
    }

    async fn notify(&self, body: &str) {
        warn!("Temperature alert: {}", body.replace('\n', "; "));

        match self.notifier.send(ALERT_TITLE, body).await {
            Ok(()) => info!("Alert notification sent."),
            Err(NotificationError::NotConfigured) => {
                warn!("Notification channel not configured, alert only logged.")
            }
            Err(e) => error!("Alert notification failed: {e}"),
        }
    }
}
