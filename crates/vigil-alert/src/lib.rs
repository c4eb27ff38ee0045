//! Rule evaluation and alert lifecycle management.
//!
//! The [`evaluator::RuleEvaluator`] checks the latest buffered value of every
//! metric a rule resolves to, tracks how long a violating condition has
//! persisted, and emits violation/recovery events. The
//! [`lifecycle::LifecycleManager`] owns the active-alert registry and drives
//! the Active → Acknowledged → Resolved state machine.

pub mod error;
pub mod evaluator;
pub mod lifecycle;
pub mod pattern;
pub mod rules;


pub use error::AlertError;
pub use rules::{AlertRule, Comparator};
