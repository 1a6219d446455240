use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument};

use crate::config::{Alert, Pushbullet, Webhook};
use crate::discord::DiscordManager;
use crate::util::get_pushbullet_token;

pub const ALERT_TITLE: &str = "Minilide temperature alert";

#[derive(Debug)]
pub enum NotificationError {
    /// No notification channel in the configuration
    NotConfigured,

    /// Pushbullet selected but no token in config or environment
    MissingToken,

    /// The request could not be sent
    Transport(reqwest::Error),

    /// The channel answered with a non-success status
    Status(u16, String),
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::NotConfigured => write!(f, "no notification channel configured"),
            NotificationError::MissingToken => write!(f, "no Pushbullet access token"),
            NotificationError::Transport(err) => write!(f, "request failed: {}", err),
            NotificationError::Status(status, body) if body.is_empty() => {
                write!(f, "channel answered with status {}", status)
            }
            NotificationError::Status(status, body) => {
                write!(f, "channel answered with status {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for NotificationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotificationError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Transport(err)
    }
}

/// Best-effort "send a short text alert" capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError>;
}

/// Delivers alerts through the channel selected in the configuration.
#[derive(Debug, Clone)]
pub struct AlertManager {
    client: Client,
    alert: Option<Alert>,
    discord_manager: DiscordManager,
}

impl AlertManager {
    pub fn new(alert: Option<Alert>) -> Self {
        let client = Client::new();
        Self {
            discord_manager: DiscordManager::new(client.clone()),
            client,
            alert,
        }
    }

    #[instrument(skip(self, pushbullet, body))]
    async fn send_pushbullet(
        &self,
        pushbullet: &Pushbullet,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let token = pushbullet
            .token
            .clone()
            .or_else(get_pushbullet_token)
            .ok_or(NotificationError::MissingToken)?;

        let payload = json!({
            "type": "note",
            "title": title,
            "body": body,
        });

        let response = self
            .client
            .post(&pushbullet.url)
            .header("Access-Token", token)
            .json(&payload)
            .send()
            .await?;

        check_status(response).await?;
        info!("Alert sent via Pushbullet.");
        Ok(())
    }

    #[instrument(skip(self, webhook, body))]
    async fn send_webhook(
        &self,
        webhook: &Webhook,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let payload = json!({
            "title": title,
            "message": body,
            "timestamp": Utc::now().to_rfc3339()
        });

        let response = self.client.post(&webhook.url).json(&payload).send().await?;

        check_status(response).await?;
        info!("Successfully sent webhook alert");
        Ok(())
    }
}

#[async_trait]
impl Notifier for AlertManager {
    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        match &self.alert {
            None => Err(NotificationError::NotConfigured),
            Some(Alert::Pushbullet(pushbullet)) => {
                self.send_pushbullet(pushbullet, title, body).await
            }
            Some(Alert::Discord(discord)) => {
                let message = self.discord_manager.build_alert_message(discord, title, body);
                self.discord_manager.send_message(discord, &message).await
            }
            Some(Alert::Webhook(webhook)) => self.send_webhook(webhook, title, body).await,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), NotificationError> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(NotificationError::Status(status, body))
}
