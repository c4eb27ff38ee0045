use crate::error::AlertError;
use crate::pattern;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use vigil_common::types::Severity;

/// Tolerance for the `eq`/`neq` comparators. Float metric values go through
/// JSON and arithmetic, so exact bit comparison would be meaningless.
pub const EQ_EPSILON: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
    Neq,
}

impl Comparator {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => (value - threshold).abs() <= EQ_EPSILON,
            Self::Neq => (value - threshold).abs() > EQ_EPSILON,
        }
    }

    /// Human-readable phrasing for alert messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Gt => "above",
            Self::Lt => "below",
            Self::Eq => "equal to",
            Self::Neq => "different from",
        }
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_than" | "gt" => Ok(Self::Gt),
            "less_than" | "lt" => Ok(Self::Lt),
            "equal" | "eq" => Ok(Self::Eq),
            "not_equal" | "neq" => Ok(Self::Neq),
            _ => Err(format!("unknown comparator: {s}")),
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gt => write!(f, "gt"),
            Self::Lt => write!(f, "lt"),
            Self::Eq => write!(f, "eq"),
            Self::Neq => write!(f, "neq"),
        }
    }
}

/// A sustained-threshold alert rule.
///
/// Configuration entity: created at startup or through the admin API, never
/// mutated mid-evaluation. `sustain_secs = 0` fires on the first violating
/// sample.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AlertRule {
    /// Unique rule name (doubles as the rule half of alert ids)
    pub name: String,
    /// Metric name or single-`*` wildcard pattern
    #[serde(rename = "metric")]
    pub metric_pattern: String,
    pub comparator: Comparator,
    pub threshold: f64,
    #[serde(rename = "sustain_seconds", default)]
    pub sustain_secs: u64,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AlertRule {
    /// Checks structural validity. Invalid rules are rejected at load time,
    /// before the engine starts.
    pub fn validate(&self) -> Result<(), AlertError> {
        if self.name.trim().is_empty() {
            return Err(AlertError::InvalidRule {
                rule: self.name.clone(),
                reason: "rule name must not be empty".to_string(),
            });
        }
        if !pattern::is_valid(&self.metric_pattern) {
            return Err(AlertError::InvalidRule {
                rule: self.name.clone(),
                reason: format!(
                    "metric pattern '{}' must be non-empty with at most one '*'",
                    self.metric_pattern
                ),
            });
        }
        if !self.threshold.is_finite() {
            return Err(AlertError::InvalidRule {
                rule: self.name.clone(),
                reason: "threshold must be a finite number".to_string(),
            });
        }
        Ok(())
    }
}
