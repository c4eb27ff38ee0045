use anyhow::Context;
use vigil_alert::AlertRule;
use vigil_notify::{ChannelConfig, ChannelRegistry};

/// JSON seed file with the initial rule set.
#[derive(serde::Deserialize)]
pub struct RulesSeedFile {
    #[serde(default)]
    pub rules: Vec<AlertRule>,
}

/// JSON seed file with the notification channel definitions.
#[derive(serde::Deserialize)]
pub struct ChannelsSeedFile {
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Loads and validates the rule seed. A single invalid rule fails the whole
/// load; a misconfigured engine must not start silently degraded.
pub fn load_rules(path: &str) -> anyhow::Result<Vec<AlertRule>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules seed '{path}'"))?;
    let seed: RulesSeedFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse rules seed '{path}'"))?;

    for rule in &seed.rules {
        rule.validate()
            .with_context(|| format!("rules seed '{path}' is invalid"))?;
    }
    tracing::info!(path = %path, count = seed.rules.len(), "Loaded alert rules");
    Ok(seed.rules)
}

/// Loads channel definitions and validates each against its plugin.
pub fn load_channels(path: &str, registry: &ChannelRegistry) -> anyhow::Result<Vec<ChannelConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read channels seed '{path}'"))?;
    let seed: ChannelsSeedFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse channels seed '{path}'"))?;

    for channel in &seed.channels {
        let plugin = registry.get_plugin(&channel.channel_type).ok_or_else(|| {
            anyhow::anyhow!(
                "channel '{}' uses unknown type '{}'",
                channel.name,
                channel.channel_type
            )
        })?;
        plugin
            .validate_config(&channel.config)
            .with_context(|| format!("channel '{}' has invalid config", channel.name))?;
    }
    tracing::info!(path = %path, count = seed.channels.len(), "Loaded notification channels");
    Ok(seed.channels)
}
