//! Outbound alert delivery to Discord or a generic webhook.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::AlertConfig;
use crate::discord;
use crate::monitor::alerts::Alert;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    target: AlertConfig,
}

impl Notifier {
    pub fn new(target: AlertConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, target })
    }

    /// Deliver one alert. Non-2xx responses are errors.
    #[instrument(skip(self, alert), fields(alert_id = %alert.id, device = %alert.device_id))]
    pub async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let (url, response) = match &self.target {
            AlertConfig::Discord(discord) => {
                let message = discord::alert_message(alert, discord.user_id.as_deref());
                let response = self.client.post(&discord.url).json(&message).send().await;
                (&discord.url, response)
            }
            AlertConfig::Webhook(webhook) => {
                let payload = webhook_payload(alert);
                let response = self.client.post(&webhook.url).json(&payload).send().await;
                (&webhook.url, response)
            }
        };

        let response = response.with_context(|| format!("failed to reach {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("notification rejected with status {status}: {body}");
        }

        debug!("notification delivered");
        Ok(())
    }
}

pub fn webhook_payload(alert: &Alert) -> Value {
    let message = if alert.is_active() {
        format!("🔴 {}", alert.message)
    } else {
        format!("✅ Resolved: {}", alert.message)
    };

    json!({
        "message": message,
        "device": alert.device_name,
        "address": alert.device_address,
        "kind": alert.kind.as_str(),
        "status": alert.status.as_str(),
        "timestamp": alert.resolved_at.unwrap_or(alert.created_at).to_rfc3339(),
    })
}
