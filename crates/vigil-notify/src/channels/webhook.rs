use crate::error::NotifyError;
use crate::plugin::ChannelPlugin;
use crate::{NotificationChannel, NotificationKind};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use vigil_common::types::Alert;

/// Posts the alert as a flat JSON document to an arbitrary HTTP endpoint.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    fn payload(alert: &Alert, kind: NotificationKind) -> Value {
        serde_json::json!({
            "alert_id": alert.id,
            "rule_name": alert.rule_name,
            "metric_name": alert.metric_name,
            "severity": alert.severity.to_string(),
            "status": kind.as_str(),
            "message": alert.message,
            "current_value": alert.current_value,
            "threshold": alert.threshold,
            "first_triggered": alert.first_triggered.to_rfc3339(),
            "last_triggered": alert.last_triggered.to_rfc3339(),
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &Alert, kind: NotificationKind) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.url)
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
        "webhook"
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
}

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<(), NotifyError> {
        let cfg: WebhookConfig =
            serde_json::from_value(config.clone()).map_err(|e| NotifyError::InvalidConfig {
                channel_type: "webhook".to_string(),
                reason: e.to_string(),
            })?;
        if !cfg.url.starts_with("http://") && !cfg.url.starts_with("https://") {
            return Err(NotifyError::InvalidConfig {
                channel_type: "webhook".to_string(),
                reason: format!("url '{}' must be http(s)", cfg.url),
            });
        }
        Ok(())
    }

    fn create_channel(&self, config: &Value) -> Result<Box<dyn NotificationChannel>, NotifyError> {
        let cfg: WebhookConfig =
            serde_json::from_value(config.clone()).map_err(|e| NotifyError::InvalidConfig {
                channel_type: "webhook".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(WebhookChannel::new(&cfg.url)))
    }
}
