use crate::error::NotifyError;
use crate::plugin::ChannelPlugin;
use crate::{NotificationChannel, NotificationKind};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use vigil_common::types::{Alert, Severity};

/// Posts a colored attachment message to a Slack-compatible incoming
/// webhook.
pub struct ChatWebhookChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl ChatWebhookChannel {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }

    fn color(severity: Severity, kind: NotificationKind) -> &'static str {
        if kind == NotificationKind::Resolved {
            return "#2e7d32";
        }
        match severity {
            Severity::Critical => "#d32f2f",
            Severity::Warning => "#f9a825",
            Severity::Info => "#1976d2",
        }
    }

    fn payload(alert: &Alert, kind: NotificationKind) -> Value {
        let tag = match kind {
            NotificationKind::Triggered => format!("[{}]", alert.severity.to_string().to_uppercase()),
            NotificationKind::Resolved => "[RESOLVED]".to_string(),
        };
        serde_json::json!({
            "attachments": [{
                "color": Self::color(alert.severity, kind),
                "title": format!("{} {}", tag, alert.rule_name),
                "text": alert.message,
                "fields": [
                    { "title": "Metric", "value": alert.metric_name, "short": true },
                    { "title": "Value", "value": format!("{:.2}", alert.current_value), "short": true },
                    { "title": "Threshold", "value": format!("{:.2}", alert.threshold), "short": true },
                    { "title": "Since", "value": alert.first_triggered.to_rfc3339(), "short": true },
                ],
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for ChatWebhookChannel {
    async fn send(&self, alert: &Alert, kind: NotificationKind) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .header("Content-Type", "application/json")
            .json(&Self::payload(alert, kind))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn channel_type(&self) -> &str {
        "chat_webhook"
    }
}

// Plugin

#[derive(Deserialize)]
struct ChatWebhookConfig {
    webhook_url: String,
}

pub struct ChatWebhookPlugin;

impl ChannelPlugin for ChatWebhookPlugin {
    fn name(&self) -> &str {
        "chat_webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<(), NotifyError> {
        let cfg: ChatWebhookConfig =
            serde_json::from_value(config.clone()).map_err(|e| NotifyError::InvalidConfig {
                channel_type: "chat_webhook".to_string(),
                reason: e.to_string(),
            })?;
        if !cfg.webhook_url.starts_with("https://") && !cfg.webhook_url.starts_with("http://") {
            return Err(NotifyError::InvalidConfig {
                channel_type: "chat_webhook".to_string(),
                reason: format!("webhook_url '{}' must be http(s)", cfg.webhook_url),
            });
        }
        Ok(())
    }

    fn create_channel(&self, config: &Value) -> Result<Box<dyn NotificationChannel>, NotifyError> {
        let cfg: ChatWebhookConfig =
            serde_json::from_value(config.clone()).map_err(|e| NotifyError::InvalidConfig {
                channel_type: "chat_webhook".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(ChatWebhookChannel::new(&cfg.webhook_url)))
    }
}
