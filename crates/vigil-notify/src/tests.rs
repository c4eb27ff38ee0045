use crate::dispatcher::{backoff_delay, ChannelConfig, DispatchPolicy, Dispatcher};
use crate::plugin::ChannelRegistry;
use crate::{NotificationChannel, NotificationKind, NotifyError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigil_common::types::{Alert, AlertStatus, Severity};

/// Counts calls; fails the first `fail_first` of them.
struct MockChannel {
    calls: Arc<AtomicU32>,
    fail_first: u32,
}

impl MockChannel {
    fn new(fail_first: u32) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                calls: calls.clone(),
                fail_first,
            },
            calls,
        )
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    async fn send(&self, _alert: &Alert, _kind: NotificationKind) -> Result<(), NotifyError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            Err(NotifyError::HttpStatus {
                status: 500,
                body: "boom".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn channel_type(&self) -> &str {
        "mock"
    }
}

fn alert(rule: &str, severity: Severity) -> Alert {
    let now = Utc::now();
    Alert {
        id: format!("{rule}:system.cpu.usage"),
        rule_name: rule.to_string(),
        metric_name: "system.cpu.usage".to_string(),
        severity,
        status: AlertStatus::Active,
        message: "cpu above 90".to_string(),
        current_value: 97.0,
        threshold: 90.0,
        first_triggered: now,
        last_triggered: now,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
    }
}

fn channel_config(name: &str, min_severity: Severity) -> ChannelConfig {
    ChannelConfig {
        name: name.to_string(),
        channel_type: "mock".to_string(),
        min_severity,
        enabled: true,
        timeout_secs: 5,
        max_retries: 3,
        retry_delay_ms: 1,
        config: serde_json::Value::Null,
    }
}

fn policy(cooldown_secs: u64, rate_limit_max: usize) -> DispatchPolicy {
    DispatchPolicy {
        cooldown_secs,
        rate_limit_max,
        rate_limit_window_secs: 60,
    }
}

#[test]
fn registry_rejects_bad_configs() {
    let registry = ChannelRegistry::default();

    let err = registry
        .create_channel("webhook", &serde_json::json!({ "url": "ftp://nope" }))
        .unwrap_err();
    assert!(matches!(err, NotifyError::InvalidConfig { .. }));

    let err = registry
        .create_channel("carrier_pigeon", &serde_json::json!({}))
        .unwrap_err();
    assert!(matches!(err, NotifyError::UnknownChannelType(_)));

    registry
        .create_channel(
            "chat_webhook",
            &serde_json::json!({ "webhook_url": "https://hooks.example.com/T00/B00" }),
        )
        .unwrap();
}

#[test]
fn email_plugin_redacts_password() {
    let registry = ChannelRegistry::default();
    let plugin = registry.get_plugin("email").unwrap();
    let redacted = plugin.redact_config(&serde_json::json!({
        "smtp_host": "smtp.example.com",
        "password": "hunter2",
    }));
    assert_eq!(redacted["password"], "***");
}

#[test]
fn backoff_doubles_per_attempt() {
    assert_eq!(backoff_delay(100, 0), Duration::from_millis(100));
    assert_eq!(backoff_delay(100, 1), Duration::from_millis(200));
    assert_eq!(backoff_delay(100, 2), Duration::from_millis(400));
}

#[tokio::test]
async fn severity_routing_filters_channels() {
    let mut dispatcher = Dispatcher::new(policy(600, 100));
    let (info_ch, info_calls) = MockChannel::new(0);
    let (crit_ch, crit_calls) = MockChannel::new(0);
    dispatcher.add_channel(channel_config("all", Severity::Info), Box::new(info_ch));
    dispatcher.add_channel(channel_config("pager", Severity::Critical), Box::new(crit_ch));

    let results = dispatcher
        .dispatch(&alert("mem_high", Severity::Warning), NotificationKind::Triggered)
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].channel, "all");
    assert_eq!(info_calls.load(Ordering::SeqCst), 1);
    assert_eq!(crit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cooldown_suppresses_repeats_until_window_elapses() {
    let mut dispatcher = Dispatcher::new(policy(600, 100));
    let (ch, calls) = MockChannel::new(0);
    dispatcher.add_channel(channel_config("ops", Severity::Info), Box::new(ch));

    let a = alert("cpu_high", Severity::Critical);
    let results = dispatcher.dispatch(&a, NotificationKind::Triggered).await;
    assert!(results[0].success);

    let results = dispatcher.dispatch(&a, NotificationKind::Triggered).await;
    assert!(results[0].skipped);
    assert_eq!(results[0].error.as_deref(), Some("cooldown active"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A different rule is a different fingerprint.
    let results = dispatcher
        .dispatch(&alert("cpu_spike", Severity::Critical), NotificationKind::Triggered)
        .await;
    assert!(results[0].success);

    tokio::time::advance(Duration::from_secs(601)).await;
    let results = dispatcher.dispatch(&a, NotificationKind::Triggered).await;
    assert!(results[0].success);

    let stats = dispatcher.stats().await;
    assert_eq!(stats["ops"].sent, 3);
    assert_eq!(stats["ops"].skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_caps_the_rolling_window() {
    let mut dispatcher = Dispatcher::new(policy(600, 2));
    let (ch, _) = MockChannel::new(0);
    dispatcher.add_channel(channel_config("ops", Severity::Info), Box::new(ch));

    for i in 0..2 {
        let results = dispatcher
            .dispatch(&alert(&format!("rule_{i}"), Severity::Warning), NotificationKind::Triggered)
            .await;
        assert!(results[0].success);
    }

    let results = dispatcher
        .dispatch(&alert("rule_2", Severity::Warning), NotificationKind::Triggered)
        .await;
    assert!(results[0].skipped);
    assert_eq!(results[0].error.as_deref(), Some("rate limit exceeded"));

    // Window rolls: slots free up again.
    tokio::time::advance(Duration::from_secs(61)).await;
    let results = dispatcher
        .dispatch(&alert("rule_3", Severity::Warning), NotificationKind::Triggered)
        .await;
    assert!(results[0].success);
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_retry_with_backoff_then_succeed() {
    let mut dispatcher = Dispatcher::new(policy(600, 100));
    let (ch, calls) = MockChannel::new(2);
    dispatcher.add_channel(channel_config("flaky", Severity::Info), Box::new(ch));

    let results = dispatcher
        .dispatch(&alert("cpu_high", Severity::Critical), NotificationKind::Triggered)
        .await;
    assert!(results[0].success);
    assert_eq!(results[0].attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn partial_failure_is_reported_per_channel() {
    let mut dispatcher = Dispatcher::new(policy(600, 100));
    let (good, _) = MockChannel::new(0);
    let (bad, bad_calls) = MockChannel::new(u32::MAX);
    dispatcher.add_channel(channel_config("good", Severity::Info), Box::new(good));
    dispatcher.add_channel(channel_config("bad", Severity::Info), Box::new(bad));

    let results = dispatcher
        .dispatch(&alert("cpu_high", Severity::Critical), NotificationKind::Triggered)
        .await;
    assert_eq!(results.len(), 2);

    let good_result = results.iter().find(|r| r.channel == "good").unwrap();
    assert!(good_result.success);

    let bad_result = results.iter().find(|r| r.channel == "bad").unwrap();
    assert!(!bad_result.success);
    assert!(!bad_result.skipped);
    assert_eq!(bad_result.attempts, 3);
    assert!(bad_result.error.as_deref().unwrap().contains("500"));
    assert_eq!(bad_calls.load(Ordering::SeqCst), 3);

    let stats = dispatcher.stats().await;
    assert_eq!(stats["good"].sent, 1);
    assert_eq!(stats["bad"].failed, 1);
}

#[tokio::test(start_paused = true)]
async fn resolution_notices_only_for_critical_and_bypass_cooldown() {
    let mut dispatcher = Dispatcher::new(policy(600, 100));
    let (ch, calls) = MockChannel::new(0);
    dispatcher.add_channel(channel_config("ops", Severity::Info), Box::new(ch));

    let warn = alert("mem_high", Severity::Warning);
    assert!(dispatcher.dispatch(&warn, NotificationKind::Resolved).await.is_empty());

    let crit = alert("cpu_high", Severity::Critical);
    dispatcher.dispatch(&crit, NotificationKind::Triggered).await;
    let results = dispatcher.dispatch(&crit, NotificationKind::Resolved).await;
    assert!(results[0].success);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Resolution does not clear the trigger cooldown: a fast re-trigger
    // stays quiet.
    let results = dispatcher.dispatch(&crit, NotificationKind::Triggered).await;
    assert!(results[0].skipped);
}
