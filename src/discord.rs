//! Discord webhook message format and alert embeds.

use serde::Serialize;

use crate::monitor::alerts::{Alert, FaultKind};

pub const COLOR_RED: u32 = 15158332;
pub const COLOR_ORANGE: u32 = 15105570;
pub const COLOR_GREEN: u32 = 3066993;

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
    pub description: Option<String>,
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

impl EmbedField {
    fn inline(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            inline: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Default)]
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

/// Embed for an opened or resolved alert
pub fn alert_embed(alert: &Alert) -> Embed {
    let (title, color) = match (alert.is_active(), alert.kind) {
        (true, FaultKind::Connectivity) => ("🔴 Device Unreachable", COLOR_RED),
        (true, FaultKind::Latency) => ("🟠 High Latency", COLOR_ORANGE),
        (false, _) => ("✅ Alert Resolved", COLOR_GREEN),
    };

    let mut fields = vec![
        EmbedField::inline("Device", &alert.device_name),
        EmbedField::inline("Address", &alert.device_address),
        EmbedField::inline("Kind", alert.kind),
    ];
    if let Some(resolution) = alert.resolution {
        fields.push(EmbedField::inline("Resolution", resolution.as_str()));
    }

    let timestamp = alert.resolved_at.unwrap_or(alert.created_at);

    Embed {
        title: Some(title.to_string()),
        description: Some(alert.message.clone()),
        color: Some(color),
        fields,
        footer: Some(EmbedFooter {
            text: format!("Alert #{} | {}", alert.id, alert.device_id),
        }),
        timestamp: Some(timestamp.to_rfc3339()),
    }
}

/// Full message for an alert, mentioning `user_id` when configured
pub fn alert_message(alert: &Alert, user_id: Option<&str>) -> Message {
    let mut builder = MessageBuilder::new().add_embed(alert_embed(alert));
    if let Some(user_id) = user_id {
        builder = builder.content(format!("Device `{}` <@{user_id}>", alert.device_name));
    }
    builder.build()
}
