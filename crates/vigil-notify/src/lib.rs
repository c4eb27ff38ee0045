//! Notification delivery with pluggable channel support.
//!
//! Alerts are fanned out to one or more [`NotificationChannel`]
//! implementations by the [`dispatcher::Dispatcher`], which owns the
//! cross-channel policies: per-alert cooldown, a rolling rate limit, and
//! retry with exponential backoff. Channels themselves perform exactly one
//! delivery attempt per call. Built-in channels are chat webhook
//! (Slack-compatible), plain webhook, and email (SMTP).

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod plugin;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use vigil_common::types::Alert;

pub use dispatcher::{ChannelConfig, DispatchPolicy, DispatchResult, Dispatcher};
pub use error::NotifyError;
pub use plugin::{ChannelPlugin, ChannelRegistry};

/// Whether a notification announces a new alert or its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Triggered,
    Resolved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Resolved => "resolved",
        }
    }
}

/// A notification delivery channel that sends alerts to an external service
/// (SMTP, chat webhook, HTTP endpoint).
///
/// Implementations are created by the corresponding [`plugin::ChannelPlugin`]
/// and driven by the dispatcher, which owns timeouts and retries. One call to
/// [`send`](NotificationChannel::send) is exactly one delivery attempt.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Performs a single delivery attempt.
    async fn send(&self, alert: &Alert, kind: NotificationKind) -> Result<(), NotifyError>;

    /// Returns the channel type name (e.g. `"email"`, `"webhook"`).
    fn channel_type(&self) -> &str;
}

impl std::fmt::Debug for dyn NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("channel_type", &self.channel_type())
            .finish()
    }
}
