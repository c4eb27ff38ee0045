use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped measurement pushed by a probe.
///
/// Immutable once created; lifetime is bounded by the metric buffer's
/// retention window.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricSample {
    /// Dotted metric name (e.g. `system.cpu.usage`, `service.scheduler.health`)
    pub name: String,
    /// Measured value
    pub value: f64,
    /// Unit label (e.g. `%`, `ms`, `count`)
    #[serde(default)]
    pub unit: String,
    /// Time the probe took the measurement
    pub timestamp: DateTime<Utc>,
    /// Optional severity the probe suggests for this reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_hint: Option<Severity>,
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use vigil_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Lifecycle state of an alert.
///
/// `Resolved` is terminal: the alert leaves the active registry and is
/// appended to history. A later re-violation creates a fresh alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// The stateful alert entity owned by the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Alert {
    /// Stable identity: `<rule name>:<concrete metric name>`
    pub id: String,
    /// Name of the rule that produced this alert
    pub rule_name: String,
    /// Concrete metric the rule resolved to (wildcards expanded)
    pub metric_name: String,
    pub severity: Severity,
    pub status: AlertStatus,
    /// Human-readable description of the violated condition
    pub message: String,
    /// Most recently observed violating value
    pub current_value: f64,
    pub threshold: f64,
    /// When the violating condition first started (timer start, not escalation)
    pub first_triggered: DateTime<Utc>,
    /// Last tick at which the condition was still violating
    pub last_triggered: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Builds the registry key for a (rule, concrete metric) pair.
pub fn alert_id(rule_name: &str, metric_name: &str) -> String {
    format!("{rule_name}:{metric_name}")
}

/// Emitted by the evaluator when a rule's condition has persisted for its
/// sustain duration. Re-emitted on every subsequent violating tick; the
/// lifecycle manager distinguishes a fresh escalation from a "still active"
/// update by registry membership.
#[derive(Debug, Clone)]
pub struct RuleViolationEvent {
    pub rule_name: String,
    pub metric_name: String,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    /// When the violating condition started (sustain timer start)
    pub started_at: DateTime<Utc>,
    /// Tick time at which this event was emitted
    pub observed_at: DateTime<Utc>,
}

/// Emitted by the evaluator when a previously escalated condition clears.
#[derive(Debug, Clone)]
pub struct RuleRecoveredEvent {
    pub rule_name: String,
    pub metric_name: String,
    /// The value that cleared the condition
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}
