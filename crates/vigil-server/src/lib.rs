//! HTTP surface and scheduling for the vigil monitoring engine.
//!
//! Wires the metric buffer, rule evaluator, alert lifecycle, and
//! notification dispatcher together behind a REST API, and runs the
//! periodic evaluation tick.

pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod seed;
pub mod state;
