use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use crate::alerts::NotificationError;
use crate::config::Discord;

const ALERT_COLOR: u32 = 15158332; // Red

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscordManager {
    client: Client,
}

impl DiscordManager {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// One embed for the whole alert, one field per out-of-band line
    /// (`label: details`).
    pub fn build_alert_embed(&self, title: &str, body: &str) -> Embed {
        let fields = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| match line.split_once(": ") {
                Some((label, details)) => EmbedField {
                    name: format!("🌡️ {label}"),
                    value: details.to_string(),
                    inline: false,
                },
                None => EmbedField {
                    name: "🌡️ Reading".to_string(),
                    value: line.to_string(),
                    inline: false,
                },
            })
            .collect();

        Embed {
            title: Some(format!("🔥 {title}")),
            color: Some(ALERT_COLOR),
            fields,
            footer: Some(EmbedFooter {
                text: "Minilide monitoring".to_string(),
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    pub fn build_alert_message(&self, discord: &Discord, title: &str, body: &str) -> Message {
        let mut message_builder =
            MessageBuilder::new().add_embed(self.build_alert_embed(title, body));
        if let Some(user_id) = &discord.user_id {
            message_builder = message_builder.content(format!("🌡️ {title} <@{user_id}>"));
        }
        message_builder.build()
    }

    #[instrument(skip(self, discord, message))]
    pub async fn send_message(
        &self,
        discord: &Discord,
        message: &Message,
    ) -> Result<(), NotificationError> {
        let response = self.client.post(&discord.url).json(message).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotificationError::Status(status, error_text));
        }

        info!("Successfully sent Discord message");
        Ok(())
    }
}
