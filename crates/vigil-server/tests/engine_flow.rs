use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use vigil_alert::evaluator::RuleEvaluator;
use vigil_alert::rules::{AlertRule, Comparator};
use vigil_common::types::{Alert, AlertStatus, MetricSample, Severity};
use vigil_notify::{
    ChannelConfig, ChannelRegistry, DispatchPolicy, Dispatcher, NotificationChannel,
    NotificationKind, NotifyError,
};
use vigil_server::config::ServerConfig;
use vigil_server::scheduler::{run_tick, Scheduler};
use vigil_server::state::AppState;

/// Records every delivery; optionally fails all of them.
struct CountingChannel {
    calls: Arc<AtomicU32>,
    kinds: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

impl CountingChannel {
    fn new(fail: bool) -> (Self, Arc<AtomicU32>, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let kinds = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                calls: calls.clone(),
                kinds: kinds.clone(),
                fail,
            },
            calls,
            kinds,
        )
    }
}

#[async_trait]
impl NotificationChannel for CountingChannel {
    async fn send(&self, _alert: &Alert, kind: NotificationKind) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.kinds.lock().unwrap().push(kind.as_str());
        if self.fail {
            Err(NotifyError::HttpStatus {
                status: 502,
                body: "bad gateway".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn channel_type(&self) -> &str {
        "mock"
    }
}

fn channel_config(name: &str, max_retries: u32) -> ChannelConfig {
    ChannelConfig {
        name: name.to_string(),
        channel_type: "mock".to_string(),
        min_severity: Severity::Info,
        enabled: true,
        timeout_secs: 5,
        max_retries,
        retry_delay_ms: 1,
        config: serde_json::Value::Null,
    }
}

fn cpu_rule(sustain_secs: u64) -> AlertRule {
    AlertRule {
        name: "cpu_sustained_high".to_string(),
        metric_pattern: "system.cpu.usage".to_string(),
        comparator: Comparator::Gt,
        threshold: 90.0,
        sustain_secs,
        severity: Severity::Critical,
        enabled: true,
    }
}

fn test_state(
    rules: Vec<AlertRule>,
    channels: Vec<(ChannelConfig, Box<dyn NotificationChannel>)>,
) -> AppState {
    let evaluator = RuleEvaluator::new(rules).unwrap();
    let mut dispatcher = Dispatcher::new(DispatchPolicy::default());
    for (config, channel) in channels {
        dispatcher.add_channel(config, channel);
    }
    AppState::new(
        ServerConfig::default(),
        evaluator,
        dispatcher,
        ChannelRegistry::default(),
    )
}

fn feed(state: &AppState, value: f64, at: DateTime<Utc>) {
    state.buffer.add(MetricSample {
        name: "system.cpu.usage".to_string(),
        value,
        unit: "%".to_string(),
        timestamp: at,
        severity_hint: None,
    });
}

#[tokio::test]
async fn sustained_violation_opens_one_alert_and_resolves_once() {
    let (channel, calls, kinds) = CountingChannel::new(false);
    let state = test_state(
        vec![cpu_rule(60)],
        vec![(channel_config("ops", 3), Box::new(channel))],
    );

    let t0 = Utc::now();

    // 96% CPU, sampled every 5s, evaluated every 30s.
    for step in 0..=6 {
        feed(&state, 96.0, t0 + Duration::seconds(step * 5));
    }
    run_tick(&state, t0).await;
    run_tick(&state, t0 + Duration::seconds(30)).await;
    assert!(state.lifecycle.active_alerts(None).is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // The condition has now held for the full sustain window.
    run_tick(&state, t0 + Duration::seconds(60)).await;
    let active = state.lifecycle.active_alerts(None);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].severity, Severity::Critical);
    assert_eq!(active[0].status, AlertStatus::Active);
    assert_eq!(active[0].id, "cpu_sustained_high:system.cpu.usage");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Still violating: the alert refreshes but does not re-notify.
    feed(&state, 97.0, t0 + Duration::seconds(85));
    run_tick(&state, t0 + Duration::seconds(90)).await;
    let active = state.lifecycle.active_alerts(None);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].current_value, 97.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Load drops: the alert resolves and a resolution notice goes out
    // (critical alerts only).
    feed(&state, 50.0, t0 + Duration::seconds(115));
    run_tick(&state, t0 + Duration::seconds(120)).await;
    assert!(state.lifecycle.active_alerts(None).is_empty());
    let history = state.lifecycle.history(None, None);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, AlertStatus::Resolved);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*kinds.lock().unwrap(), vec!["triggered", "resolved"]);

    // Quiet afterwards.
    feed(&state, 50.0, t0 + Duration::seconds(145));
    run_tick(&state, t0 + Duration::seconds(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn warning_alerts_do_not_send_resolution_notices() {
    let (channel, calls, kinds) = CountingChannel::new(false);
    let mut rule = cpu_rule(0);
    rule.severity = Severity::Warning;
    let state = test_state(
        vec![rule],
        vec![(channel_config("ops", 3), Box::new(channel))],
    );

    let t0 = Utc::now();
    feed(&state, 96.0, t0);
    run_tick(&state, t0).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    feed(&state, 50.0, t0 + Duration::seconds(30));
    run_tick(&state, t0 + Duration::seconds(30)).await;
    assert_eq!(state.lifecycle.history(None, None).len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*kinds.lock().unwrap(), vec!["triggered"]);
}

#[tokio::test]
async fn one_failing_channel_does_not_block_the_other() {
    let (good, good_calls, _) = CountingChannel::new(false);
    let (bad, bad_calls, _) = CountingChannel::new(true);
    let state = test_state(
        vec![cpu_rule(0)],
        vec![
            (channel_config("good", 3), Box::new(good)),
            (channel_config("bad", 2), Box::new(bad)),
        ],
    );

    let t0 = Utc::now();
    feed(&state, 96.0, t0);
    run_tick(&state, t0).await;

    // The alert opens regardless of delivery outcome.
    assert_eq!(state.lifecycle.active_alerts(None).len(), 1);
    assert_eq!(good_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bad_calls.load(Ordering::SeqCst), 2);

    let stats = state.dispatcher.stats().await;
    assert_eq!(stats["good"].sent, 1);
    assert_eq!(stats["bad"].failed, 1);
}

#[tokio::test]
async fn acknowledged_alert_still_resolves() {
    let (channel, _, _) = CountingChannel::new(false);
    let state = test_state(
        vec![cpu_rule(0)],
        vec![(channel_config("ops", 3), Box::new(channel))],
    );

    let t0 = Utc::now();
    feed(&state, 96.0, t0);
    run_tick(&state, t0).await;

    let alert = state
        .lifecycle
        .acknowledge("cpu_sustained_high:system.cpu.usage", "oncall")
        .unwrap();
    assert_eq!(alert.status, AlertStatus::Acknowledged);

    feed(&state, 50.0, t0 + Duration::seconds(30));
    run_tick(&state, t0 + Duration::seconds(30)).await;
    let history = state.lifecycle.history(None, None);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, AlertStatus::Resolved);
    assert_eq!(history[0].acknowledged_by.as_deref(), Some("oncall"));
}

#[tokio::test(start_paused = true)]
async fn scheduler_start_is_idempotent_and_stop_is_cooperative() {
    let (channel, _, _) = CountingChannel::new(false);
    let state = test_state(
        vec![],
        vec![(channel_config("ops", 3), Box::new(channel))],
    );

    let scheduler = Scheduler::new(state, 30);
    assert!(!scheduler.is_running());

    scheduler.start();
    scheduler.start(); // second start is a no-op
    assert!(scheduler.is_running());

    scheduler.stop().await;
    assert!(!scheduler.is_running());
    scheduler.stop().await; // stopping again is harmless
}
