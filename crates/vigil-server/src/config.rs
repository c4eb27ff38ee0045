use serde::{Deserialize, Serialize};
use vigil_notify::DispatchPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Seconds between evaluation ticks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// CORS allowed origins; empty allows all origins (development mode)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// Path to a JSON file with the initial rule set
    #[serde(default)]
    pub rules_seed: Option<String>,

    /// Path to a JSON file with the notification channel definitions
    #[serde(default)]
    pub channels_seed: Option<String>,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub dispatch: DispatchPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,
    #[serde(default = "default_buffer_retention_secs")]
    pub retention_secs: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_buffer_capacity(),
            retention_secs: default_buffer_retention_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            tick_secs: default_tick_secs(),
            cors_allowed_origins: Vec::new(),
            rules_seed: None,
            channels_seed: None,
            buffer: BufferConfig::default(),
            dispatch: DispatchPolicy::default(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_tick_secs() -> u64 {
    30
}

fn default_buffer_capacity() -> usize {
    vigil_metrics::buffer::DEFAULT_CAPACITY
}

fn default_buffer_retention_secs() -> u64 {
    vigil_metrics::buffer::DEFAULT_RETENTION_SECS
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
