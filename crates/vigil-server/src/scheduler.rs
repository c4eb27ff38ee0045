use crate::state::AppState;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use vigil_notify::NotificationKind;

/// Runs one evaluation pass: evaluates every rule against the buffer,
/// applies the resulting events to the alert registry, and dispatches
/// notifications on state changes (newly triggered, resolved). Re-emitted
/// violations of an already-active alert refresh it without notifying.
pub async fn run_tick(state: &AppState, now: DateTime<Utc>) {
    let events = state.lock_evaluator().evaluate(&state.buffer, now);

    for event in events {
        match event {
            vigil_alert::evaluator::EngineEvent::Violation(v) => {
                let (alert, is_new) = state.lifecycle.on_violation(&v);
                if is_new {
                    state
                        .dispatcher
                        .dispatch(&alert, NotificationKind::Triggered)
                        .await;
                }
            }
            vigil_alert::evaluator::EngineEvent::Recovered(r) => {
                if let Some(alert) = state.lifecycle.on_recovered(&r) {
                    state
                        .dispatcher
                        .dispatch(&alert, NotificationKind::Resolved)
                        .await;
                }
            }
        }
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives the periodic evaluation tick.
///
/// `start` is idempotent; `stop` signals the loop and waits for the current
/// tick to finish, so a tick is never cut off mid-dispatch.
pub struct Scheduler {
    state: AppState,
    tick: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(state: AppState, tick_secs: u64) -> Self {
        Self {
            state,
            tick: Duration::from_secs(tick_secs.max(1)),
            running: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if running.is_some() {
            tracing::warn!("Scheduler already running, start ignored");
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let state = self.state.clone();
        let tick = self.tick;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            // The first tick fires immediately; skip it so rules see a full
            // interval of samples before the first evaluation.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&state, Utc::now()).await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Scheduler stopping");
                        break;
                    }
                }
            }
        });

        tracing::info!(tick_secs = tick.as_secs(), "Scheduler started");
        *running = Some(Running { shutdown, handle });
    }

    pub async fn stop(&self) {
        let running = {
            let mut guard = self.running.lock().unwrap_or_else(|p| p.into_inner());
            guard.take()
        };
        let Some(running) = running else {
            return;
        };
        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
        tracing::info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }
}
