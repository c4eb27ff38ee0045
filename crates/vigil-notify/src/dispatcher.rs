use crate::error::NotifyError;
use crate::plugin::ChannelRegistry;
use crate::{NotificationChannel, NotificationKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use vigil_common::types::{Alert, Severity};

/// One configured channel instance: routing settings plus the JSON blob the
/// plugin was built from.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChannelConfig {
    /// Unique instance name (e.g. `"ops-chat"`)
    pub name: String,
    /// Plugin type name (`"email"`, `"webhook"`, `"chat_webhook"`)
    #[serde(rename = "type")]
    pub channel_type: String,
    /// Lowest severity this channel receives
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-attempt delivery timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum delivery attempts per notification
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay; attempt n waits `retry_delay_ms * 2^n`
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Plugin-specific configuration
    #[serde(default)]
    #[schema(value_type = Object)]
    pub config: Value,
}

fn default_min_severity() -> Severity {
    Severity::Info
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

impl ChannelConfig {
    /// Routing check: enabled and severity at or above the floor.
    pub fn should_send(&self, severity: Severity) -> bool {
        self.enabled && severity >= self.min_severity
    }
}

/// Dispatch policy shared by all channels. The windows are deployment-wide
/// settings; the state they govern is tracked per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchPolicy {
    /// Minimum gap between trigger notifications for the same
    /// (channel, fingerprint) pair
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Maximum sends per channel within the rolling window
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: usize,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

fn default_cooldown_secs() -> u64 {
    600
}

fn default_rate_limit_max() -> usize {
    10
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
        }
    }
}

/// Outcome of one notification on one channel.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    /// True when policy (cooldown, rate limit) suppressed delivery; no
    /// attempt was made
    pub skipped: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lifetime delivery counters for one channel instance.
#[derive(Debug, Clone, Copy, Default, Serialize, utoipa::ToSchema)]
pub struct ChannelStats {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

struct BoundChannel {
    config: ChannelConfig,
    channel: Box<dyn NotificationChannel>,
}

#[derive(Default)]
struct DispatchState {
    /// Last successful trigger notification per (channel, fingerprint)
    cooldowns: HashMap<(String, u64), Instant>,
    /// Send times inside the rolling rate-limit window, per channel
    recent: HashMap<String, VecDeque<Instant>>,
    stats: HashMap<String, ChannelStats>,
}

/// Fans alerts out to the configured channels, enforcing per-channel
/// cooldown, the rolling rate limit, and retry with exponential backoff.
///
/// Channels perform a single delivery attempt per call; every policy
/// decision lives here. The cooldown stamp is recorded only on successful
/// delivery, so a channel that was down keeps being tried on later state
/// changes. Resolution notices are sent for critical alerts only, bypass
/// the cooldown, and do not clear it, so a flapping alert stays quiet for
/// the full cooldown window.
pub struct Dispatcher {
    policy: DispatchPolicy,
    channels: Vec<BoundChannel>,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            policy,
            channels: Vec::new(),
            state: Mutex::new(DispatchState::default()),
        }
    }

    /// Builds a dispatcher from channel definitions, instantiating each
    /// through the registry. Fails on the first invalid definition.
    pub fn from_configs(
        registry: &ChannelRegistry,
        configs: Vec<ChannelConfig>,
        policy: DispatchPolicy,
    ) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::new(policy);
        for config in configs {
            let channel = registry.create_channel(&config.channel_type, &config.config)?;
            dispatcher.add_channel(config, channel);
        }
        Ok(dispatcher)
    }

    pub fn add_channel(&mut self, config: ChannelConfig, channel: Box<dyn NotificationChannel>) {
        self.channels.push(BoundChannel { config, channel });
    }

    pub fn channel_configs(&self) -> Vec<&ChannelConfig> {
        self.channels.iter().map(|b| &b.config).collect()
    }

    pub async fn stats(&self) -> HashMap<String, ChannelStats> {
        self.state.lock().await.stats.clone()
    }

    /// Sends one notification for `alert` to every eligible channel,
    /// concurrently.
    ///
    /// Returns one result per eligible channel; channels filtered out by
    /// severity routing produce no entry. A failing channel never blocks
    /// the others, and delivery is at-least-once: a notification counted as
    /// sent may still be lost downstream of the receiving endpoint.
    pub async fn dispatch(&self, alert: &Alert, kind: NotificationKind) -> Vec<DispatchResult> {
        if kind == NotificationKind::Resolved && alert.severity < Severity::Critical {
            return Vec::new();
        }

        let fp = fingerprint(alert);
        futures::future::join_all(
            self.channels
                .iter()
                .filter(|b| b.config.should_send(alert.severity))
                .map(|bound| self.deliver(bound, alert, kind, fp)),
        )
        .await
    }

    /// Policy gate: returns a skip result when the channel must not send
    /// now, otherwise records the send in the rolling window.
    async fn check_policy(
        &self,
        config: &ChannelConfig,
        alert: &Alert,
        kind: NotificationKind,
        fp: u64,
    ) -> Option<DispatchResult> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if kind == NotificationKind::Triggered {
            let in_cooldown = state
                .cooldowns
                .get(&(config.name.clone(), fp))
                .is_some_and(|last| {
                    now.duration_since(*last) < Duration::from_secs(self.policy.cooldown_secs)
                });
            if in_cooldown {
                tracing::debug!(
                    channel = %config.name,
                    alert_id = %alert.id,
                    "Notification suppressed by cooldown"
                );
                return Some(self.skip(&mut state, config, "cooldown active"));
            }
        }

        let window = Duration::from_secs(self.policy.rate_limit_window_secs);
        let recent = state.recent.entry(config.name.clone()).or_default();
        while recent
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            recent.pop_front();
        }
        if recent.len() >= self.policy.rate_limit_max {
            tracing::warn!(
                channel = %config.name,
                alert_id = %alert.id,
                "Notification suppressed by rate limit"
            );
            return Some(self.skip(&mut state, config, "rate limit exceeded"));
        }
        recent.push_back(now);
        None
    }

    fn skip(
        &self,
        state: &mut DispatchState,
        config: &ChannelConfig,
        reason: &str,
    ) -> DispatchResult {
        state.stats.entry(config.name.clone()).or_default().skipped += 1;
        DispatchResult {
            channel: config.name.clone(),
            success: false,
            skipped: true,
            attempts: 0,
            error: Some(reason.to_string()),
        }
    }

    async fn deliver(
        &self,
        bound: &BoundChannel,
        alert: &Alert,
        kind: NotificationKind,
        fp: u64,
    ) -> DispatchResult {
        let config = &bound.config;
        if let Some(skipped) = self.check_policy(config, alert, kind, fp).await {
            return skipped;
        }

        let max_attempts = config.max_retries.max(1);
        let mut last_err = None;

        for attempt in 0..max_attempts {
            let outcome = tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                bound.channel.send(alert, kind),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {
                    tracing::info!(
                        channel = %config.name,
                        alert_id = %alert.id,
                        kind = kind.as_str(),
                        "Notification delivered"
                    );
                    let mut state = self.state.lock().await;
                    if kind == NotificationKind::Triggered {
                        state
                            .cooldowns
                            .insert((config.name.clone(), fp), Instant::now());
                    }
                    state.stats.entry(config.name.clone()).or_default().sent += 1;
                    return DispatchResult {
                        channel: config.name.clone(),
                        success: true,
                        skipped: false,
                        attempts: attempt + 1,
                        error: None,
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        channel = %config.name,
                        attempt = attempt + 1,
                        error = %e,
                        "Notification attempt failed"
                    );
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    let e = NotifyError::Timeout(config.timeout_secs);
                    tracing::warn!(
                        channel = %config.name,
                        attempt = attempt + 1,
                        error = %e,
                        "Notification attempt failed"
                    );
                    last_err = Some(e.to_string());
                }
            }

            if attempt + 1 < max_attempts {
                tokio::time::sleep(backoff_delay(config.retry_delay_ms, attempt)).await;
            }
        }

        tracing::error!(
            channel = %config.name,
            alert_id = %alert.id,
            attempts = max_attempts,
            "Notification failed after all attempts"
        );
        let mut state = self.state.lock().await;
        state.stats.entry(config.name.clone()).or_default().failed += 1;
        DispatchResult {
            channel: config.name.clone(),
            success: false,
            skipped: false,
            attempts: max_attempts,
            error: last_err,
        }
    }
}

/// Delay before retry number `attempt + 1`: `base_ms * 2^attempt`.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt)))
}

/// Collapses an alert to the identity its cooldown is tracked under.
fn fingerprint(alert: &Alert) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(alert.rule_name.as_bytes());
    hasher.update([0]);
    hasher.update(alert.metric_name.as_bytes());
    hasher.update([0]);
    hasher.update(alert.severity.to_string().as_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}
