use crate::error::NotifyError;
use crate::plugin::ChannelPlugin;
use crate::{NotificationChannel, NotificationKind};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::Value;
use vigil_common::types::Alert;

/// Delivers alerts as plain-text email over SMTP.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: Vec<String>,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
        to: Vec<String>,
    ) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?.port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
            to,
        })
    }

    fn subject(alert: &Alert, kind: NotificationKind) -> String {
        let status_tag = if kind == NotificationKind::Resolved {
            "[RESOLVED] "
        } else {
            ""
        };
        format!(
            "[vigil][{}] {}{} - {}",
            alert.severity, status_tag, alert.rule_name, alert.metric_name
        )
    }

    fn format_body(alert: &Alert, kind: NotificationKind) -> String {
        format!(
            "Alert: {severity} ({status})\nRule: {rule}\nMetric: {metric}\nValue: {value:.2}\nThreshold: {threshold:.2}\nMessage: {message}\nFirst triggered: {first}\nLast triggered: {last}",
            severity = alert.severity,
            status = kind.as_str(),
            rule = alert.rule_name,
            metric = alert.metric_name,
            value = alert.current_value,
            threshold = alert.threshold,
            message = alert.message,
            first = alert.first_triggered.to_rfc3339(),
            last = alert.last_triggered.to_rfc3339(),
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, alert: &Alert, kind: NotificationKind) -> Result<(), NotifyError> {
        let subject = Self::subject(alert, kind);
        let body = Self::format_body(alert, kind);

        for recipient in &self.to {
            let email = Message::builder()
                .from(self.from.parse()?)
                .to(recipient.parse()?)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())?;
            self.transport.send(email).await?;
        }
        Ok(())
    }

    fn channel_type(&self) -> &str {
        "email"
    }
}

// Plugin

#[derive(Deserialize)]
struct EmailConfig {
    smtp_host: String,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    username: Option<String>,
    password: Option<String>,
    from: String,
    to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

pub struct EmailPlugin;

impl EmailPlugin {
    fn parse(config: &Value) -> Result<EmailConfig, NotifyError> {
        let cfg: EmailConfig =
            serde_json::from_value(config.clone()).map_err(|e| NotifyError::InvalidConfig {
                channel_type: "email".to_string(),
                reason: e.to_string(),
            })?;
        if cfg.to.is_empty() {
            return Err(NotifyError::InvalidConfig {
                channel_type: "email".to_string(),
                reason: "at least one recipient is required".to_string(),
            });
        }
        Ok(cfg)
    }
}

impl ChannelPlugin for EmailPlugin {
    fn name(&self) -> &str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> Result<(), NotifyError> {
        Self::parse(config).map(|_| ())
    }

    fn create_channel(&self, config: &Value) -> Result<Box<dyn NotificationChannel>, NotifyError> {
        let cfg = Self::parse(config)?;
        Ok(Box::new(EmailChannel::new(
            &cfg.smtp_host,
            cfg.smtp_port,
            cfg.username.as_deref(),
            cfg.password.as_deref(),
            &cfg.from,
            cfg.to,
        )?))
    }

    fn redact_config(&self, config: &Value) -> Value {
        let mut redacted = config.clone();
        if let Some(obj) = redacted.as_object_mut() {
            if obj.contains_key("password") {
                obj.insert("password".to_string(), Value::String("***".to_string()));
            }
        }
        redacted
    }
}
