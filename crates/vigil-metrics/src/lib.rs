//! Bounded in-memory rolling store for metric samples.
//!
//! Probes push samples concurrently through [`MetricBuffer::add`]; the
//! evaluator reads the latest values each tick. Samples are evicted
//! oldest-first once the capacity is reached, and pruned by age on write.

pub mod buffer;

pub use buffer::MetricBuffer;
