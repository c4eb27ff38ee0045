/// Errors surfaced by the alerting subsystem.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Acknowledge targeted an alert id that is not in the active registry
    /// (unknown, or already resolved).
    #[error("alert '{0}' not found in active registry")]
    NotFound(String),

    /// A rule definition failed validation at load time.
    #[error("invalid alert rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },
}
