use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use vigil_alert::evaluator::RuleEvaluator;
use vigil_alert::lifecycle::LifecycleManager;
use vigil_metrics::MetricBuffer;
use vigil_notify::{ChannelRegistry, Dispatcher};

#[derive(Clone)]
pub struct AppState {
    pub buffer: Arc<MetricBuffer>,
    pub evaluator: Arc<Mutex<RuleEvaluator>>,
    pub lifecycle: Arc<LifecycleManager>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<ChannelRegistry>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        evaluator: RuleEvaluator,
        dispatcher: Dispatcher,
        registry: ChannelRegistry,
    ) -> Self {
        let buffer = MetricBuffer::new(config.buffer.capacity, config.buffer.retention_secs);
        Self {
            buffer: Arc::new(buffer),
            evaluator: Arc::new(Mutex::new(evaluator)),
            lifecycle: Arc::new(LifecycleManager::new()),
            dispatcher: Arc::new(dispatcher),
            registry: Arc::new(registry),
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }

    pub fn lock_evaluator(&self) -> MutexGuard<'_, RuleEvaluator> {
        self.evaluator.lock().unwrap_or_else(|p| p.into_inner())
    }
}
