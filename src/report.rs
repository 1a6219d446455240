//! Launching the external weekly report generator

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ReportConfig;

#[async_trait]
pub trait ReportTrigger: Send + Sync {
    async fn trigger(&self) -> anyhow::Result<()>;
}

/// Starts the configured command without waiting for it to finish.
#[derive(Debug, Clone)]
pub struct CommandReport {
    command: String,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ReportTrigger for CommandReport {
    async fn trigger(&self) -> anyhow::Result<()> {
        let child = Command::new(&self.command)
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                anyhow::anyhow!("failed to launch report command `{}`: {e}", self.command)
            })?;

        info!(
            "Report generation started ({}, pid {}).",
            self.command,
            child.id().unwrap_or_default()
        );
        Ok(())
    }
}

/// Used when no report command is configured: the slot is only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReport;

#[async_trait]
impl ReportTrigger for NoReport {
    async fn trigger(&self) -> anyhow::Result<()> {
        warn!("Report slot reached but no report command is configured.");
        Ok(())
    }
}

pub fn from_config(config: Option<&ReportConfig>) -> Box<dyn ReportTrigger> {
    match config {
        Some(report) => Box::new(CommandReport::new(report.command.clone())),
        None => Box::new(NoReport),
    }
}
