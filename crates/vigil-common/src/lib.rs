//! Shared data model for the vigil health-monitoring engine.
//!
//! Samples flow from probes into the metric buffer, rules evaluate them
//! into violation/recovery events, and the lifecycle manager turns those
//! events into [`types::Alert`] state transitions.

pub mod types;
