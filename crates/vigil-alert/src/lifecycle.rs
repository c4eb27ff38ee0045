use crate::error::AlertError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use vigil_common::types::{
    alert_id, Alert, AlertStatus, RuleRecoveredEvent, RuleViolationEvent, Severity,
};

#[derive(Default)]
struct Registry {
    /// Alerts in Active or Acknowledged state, keyed by alert id.
    active: HashMap<String, Alert>,
    /// Resolved alerts, in resolution order.
    history: Vec<Alert>,
}

/// Owns the alert registry and drives the Active → Acknowledged → Resolved
/// state machine.
///
/// One alert exists per (rule, metric) pair at a time; repeated violations of
/// an already-active pair refresh the existing alert instead of opening a new
/// one. Acknowledged alerts stay in the active registry so recovery can still
/// resolve them.
pub struct LifecycleManager {
    registry: Mutex<Registry>,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Applies a violation event. Returns the alert and whether it is newly
    /// triggered (true) or a refresh of an existing one (false).
    ///
    /// Acknowledged alerts are refreshed but keep their Acknowledged status;
    /// re-triggering does not un-acknowledge.
    pub fn on_violation(&self, event: &RuleViolationEvent) -> (Alert, bool) {
        let id = alert_id(&event.rule_name, &event.metric_name);
        let mut registry = self.lock();

        if let Some(alert) = registry.active.get_mut(&id) {
            alert.current_value = event.value;
            alert.message = event.message.clone();
            alert.last_triggered = event.observed_at;
            return (alert.clone(), false);
        }

        let alert = Alert {
            id: id.clone(),
            rule_name: event.rule_name.clone(),
            metric_name: event.metric_name.clone(),
            severity: event.severity,
            status: AlertStatus::Active,
            message: event.message.clone(),
            current_value: event.value,
            threshold: event.threshold,
            first_triggered: event.started_at,
            last_triggered: event.observed_at,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
        };
        tracing::info!(
            alert_id = %id,
            severity = %alert.severity,
            value = alert.current_value,
            "Alert triggered"
        );
        registry.active.insert(id, alert.clone());
        (alert, true)
    }

    /// Applies a recovery event. Moves the alert to Resolved and into
    /// history. Returns None if no alert was active for the pair.
    pub fn on_recovered(&self, event: &RuleRecoveredEvent) -> Option<Alert> {
        let id = alert_id(&event.rule_name, &event.metric_name);
        let mut registry = self.lock();
        let mut alert = registry.active.remove(&id)?;
        alert.status = AlertStatus::Resolved;
        alert.current_value = event.value;
        alert.resolved_at = Some(event.observed_at);
        tracing::info!(alert_id = %id, value = event.value, "Alert resolved");
        registry.history.push(alert.clone());
        Some(alert)
    }

    /// Marks an active alert as acknowledged. Idempotent on already
    /// acknowledged alerts (the original acknowledger is kept). Fails with
    /// [`AlertError::NotFound`] for unknown or resolved ids.
    pub fn acknowledge(&self, id: &str, by: &str) -> Result<Alert, AlertError> {
        let mut registry = self.lock();
        let alert = registry
            .active
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;
        if alert.status != AlertStatus::Acknowledged {
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_at = Some(Utc::now());
            alert.acknowledged_by = Some(by.to_string());
            tracing::info!(alert_id = %id, by = %by, "Alert acknowledged");
        }
        Ok(alert.clone())
    }

    /// All Active and Acknowledged alerts, optionally filtered by severity,
    /// newest first.
    pub fn active_alerts(&self, severity: Option<Severity>) -> Vec<Alert> {
        let registry = self.lock();
        let mut alerts: Vec<Alert> = registry
            .active
            .values()
            .filter(|a| severity.is_none_or(|s| a.severity == s))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.last_triggered.cmp(&a.last_triggered));
        alerts
    }

    /// Resolved alerts, optionally filtered by resolution time and severity.
    pub fn history(
        &self,
        since: Option<DateTime<Utc>>,
        severity: Option<Severity>,
    ) -> Vec<Alert> {
        let registry = self.lock();
        registry
            .history
            .iter()
            .filter(|a| since.is_none_or(|t| a.resolved_at.is_some_and(|r| r >= t)))
            .filter(|a| severity.is_none_or(|s| a.severity == s))
            .cloned()
            .collect()
    }
}
