use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use vigil_common::types::MetricSample;

pub const DEFAULT_CAPACITY: usize = 10_000;
pub const DEFAULT_RETENTION_SECS: u64 = 3_600;

struct BufferInner {
    samples: VecDeque<MetricSample>,
    /// Most recent sample per metric name, kept in step with `samples`.
    latest: HashMap<String, MetricSample>,
}

/// Capacity- and age-bounded rolling store of metric samples.
///
/// Safe for many concurrent probe writers and a single evaluator reader;
/// all access goes through one mutex. Queries on unknown metrics return
/// empty results rather than errors.
pub struct MetricBuffer {
    capacity: usize,
    retention: Duration,
    inner: Mutex<BufferInner>,
}

impl MetricBuffer {
    pub fn new(capacity: usize, retention_secs: u64) -> Self {
        Self {
            capacity: capacity.max(1),
            retention: Duration::seconds(retention_secs as i64),
            inner: Mutex::new(BufferInner {
                samples: VecDeque::new(),
                latest: HashMap::new(),
            }),
        }
    }

    /// Appends a sample, evicting the oldest entries when the buffer is full
    /// and pruning anything older than the retention window.
    pub fn add(&self, sample: MetricSample) {
        let mut inner = self.lock();
        if inner.samples.len() >= self.capacity {
            inner.samples.pop_front();
        }
        inner.latest.insert(sample.name.clone(), sample.clone());
        inner.samples.push_back(sample);
        Self::evict_aged(&mut inner, self.retention, Utc::now());
    }

    /// Returns samples for `name`, oldest first, optionally bounded below by
    /// `since`.
    pub fn query(&self, name: &str, since: Option<DateTime<Utc>>) -> Vec<MetricSample> {
        let inner = self.lock();
        inner
            .samples
            .iter()
            .filter(|s| s.name == name)
            .filter(|s| since.is_none_or(|cutoff| s.timestamp >= cutoff))
            .cloned()
            .collect()
    }

    /// The most recent sample for `name`, if any.
    pub fn latest(&self, name: &str) -> Option<MetricSample> {
        self.lock().latest.get(name).cloned()
    }

    /// All metric names currently known to the buffer.
    pub fn metric_names(&self) -> Vec<String> {
        self.lock().latest.keys().cloned().collect()
    }

    /// Snapshot of the latest sample for every known metric.
    pub fn latest_all(&self) -> Vec<MetricSample> {
        self.lock().latest.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    fn evict_aged(inner: &mut BufferInner, retention: Duration, now: DateTime<Utc>) {
        let cutoff = now - retention;
        while let Some(front) = inner.samples.front() {
            if front.timestamp < cutoff {
                inner.samples.pop_front();
            } else {
                break;
            }
        }
        // A metric whose last sample aged out no longer counts as known.
        inner
            .latest
            .retain(|_, sample| sample.timestamp >= cutoff);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufferInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MetricBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_RETENTION_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(name: &str, value: f64, secs_ago: i64) -> MetricSample {
        MetricSample {
            name: name.to_string(),
            value,
            unit: "%".to_string(),
            timestamp: Utc::now() - Duration::seconds(secs_ago),
            severity_hint: None,
        }
    }

    #[test]
    fn latest_returns_most_recent_sample() {
        let buffer = MetricBuffer::default();
        buffer.add(sample("system.cpu.usage", 40.0, 20));
        buffer.add(sample("system.cpu.usage", 55.0, 10));
        buffer.add(sample("system.memory.usage", 70.0, 5));

        let latest = buffer.latest("system.cpu.usage").unwrap();
        assert_eq!(latest.value, 55.0);
        assert!(buffer.latest("system.disk.usage").is_none());
    }

    #[test]
    fn query_filters_by_name_and_since() {
        let buffer = MetricBuffer::default();
        buffer.add(sample("system.cpu.usage", 40.0, 120));
        buffer.add(sample("system.cpu.usage", 50.0, 60));
        buffer.add(sample("system.cpu.usage", 60.0, 5));
        buffer.add(sample("system.memory.usage", 70.0, 5));

        let all = buffer.query("system.cpu.usage", None);
        assert_eq!(all.len(), 3);
        assert_eq!(all.last().unwrap().value, 60.0);

        let recent = buffer.query(
            "system.cpu.usage",
            Some(Utc::now() - Duration::seconds(30)),
        );
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].value, 60.0);

        assert!(buffer.query("nope", None).is_empty());
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let buffer = MetricBuffer::new(3, 3_600);
        for i in 0..5 {
            buffer.add(sample("system.cpu.usage", i as f64, 5 - i));
        }
        assert_eq!(buffer.len(), 3);
        let values: Vec<f64> = buffer
            .query("system.cpu.usage", None)
            .iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn aged_samples_are_pruned_on_write() {
        let buffer = MetricBuffer::new(100, 60);
        buffer.add(sample("service.api.health", 1.0, 300));
        buffer.add(sample("system.cpu.usage", 50.0, 0));

        assert_eq!(buffer.len(), 1);
        assert!(buffer.latest("service.api.health").is_none());
        let names = buffer.metric_names();
        assert_eq!(names, vec!["system.cpu.usage".to_string()]);
    }
}
