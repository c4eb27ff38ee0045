use crate::error::AlertError;
use crate::pattern;
use crate::rules::AlertRule;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use vigil_common::types::{RuleRecoveredEvent, RuleViolationEvent};
use vigil_metrics::MetricBuffer;

/// Key: (rule name, concrete metric name)
type TimerKey = (String, String);

/// Tracks how long a violating condition has persisted for one
/// (rule, metric) pair.
struct ViolationTimer {
    started_at: DateTime<Utc>,
    /// Set once the sustain duration has elapsed and a violation event
    /// was emitted; gates recovery events.
    escalated: bool,
}

/// Output of one evaluation tick.
#[derive(Debug)]
pub enum EngineEvent {
    Violation(RuleViolationEvent),
    Recovered(RuleRecoveredEvent),
}

/// Evaluates the rule set against the latest buffered metric values.
///
/// Holds per-(rule, metric) sustain timers between ticks. Rules are mutated
/// only through the explicit add/update/remove operations, never while an
/// evaluation is in progress (the owner serializes access).
pub struct RuleEvaluator {
    rules: Vec<AlertRule>,
    timers: HashMap<TimerKey, ViolationTimer>,
}

impl RuleEvaluator {
    pub fn new(rules: Vec<AlertRule>) -> Result<Self, AlertError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self {
            rules,
            timers: HashMap::new(),
        })
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn get_rule(&self, name: &str) -> Option<&AlertRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Adds a rule at runtime. Fails if the definition is invalid or the
    /// name is already taken.
    pub fn add_rule(&mut self, rule: AlertRule) -> Result<(), AlertError> {
        rule.validate()?;
        if self.get_rule(&rule.name).is_some() {
            return Err(AlertError::InvalidRule {
                rule: rule.name.clone(),
                reason: "a rule with this name already exists".to_string(),
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Replaces an existing rule in place, discarding its sustain timers so
    /// the new condition starts fresh.
    pub fn update_rule(&mut self, rule: AlertRule) -> Result<(), AlertError> {
        rule.validate()?;
        let slot = self
            .rules
            .iter_mut()
            .find(|r| r.name == rule.name)
            .ok_or_else(|| AlertError::NotFound(rule.name.clone()))?;
        *slot = rule;
        let name = slot.name.clone();
        self.timers.retain(|(rule_name, _), _| *rule_name != name);
        Ok(())
    }

    /// Removes a rule by name. Returns true if found and removed.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let len_before = self.rules.len();
        self.rules.retain(|r| r.name != name);
        self.timers.retain(|(rule_name, _), _| rule_name != name);
        self.rules.len() < len_before
    }

    /// Replaces the whole rule set, clearing all sustain timers.
    pub fn replace_rules(&mut self, rules: Vec<AlertRule>) -> Result<(), AlertError> {
        for rule in &rules {
            rule.validate()?;
        }
        self.rules = rules;
        self.timers.clear();
        Ok(())
    }

    /// One evaluation tick.
    ///
    /// For every enabled rule, resolves its metric pattern against all known
    /// metric names and checks the latest sample of each. A violation event
    /// is emitted on every violating tick once the condition has persisted
    /// for the rule's sustain duration; a recovery event is emitted when an
    /// escalated condition clears. Missing and NaN samples are skipped.
    pub fn evaluate(&mut self, buffer: &MetricBuffer, now: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let names = buffer.metric_names();

        let Self { rules, timers } = self;
        for rule in rules.iter().filter(|r| r.enabled) {
            for name in names.iter().filter(|n| pattern::matches(&rule.metric_pattern, n)) {
                let Some(sample) = buffer.latest(name) else {
                    continue;
                };
                if sample.value.is_nan() {
                    tracing::debug!(metric = %name, rule = %rule.name, "Skipping NaN sample");
                    continue;
                }

                let key = (rule.name.clone(), name.clone());
                if rule.comparator.check(sample.value, rule.threshold) {
                    let timer = timers.entry(key).or_insert(ViolationTimer {
                        started_at: now,
                        escalated: false,
                    });
                    let elapsed = (now - timer.started_at).num_seconds().max(0) as u64;
                    if elapsed >= rule.sustain_secs {
                        timer.escalated = true;
                        events.push(EngineEvent::Violation(RuleViolationEvent {
                            rule_name: rule.name.clone(),
                            metric_name: name.clone(),
                            severity: rule.severity,
                            message: violation_message(rule, &sample.unit, sample.value),
                            value: sample.value,
                            threshold: rule.threshold,
                            started_at: timer.started_at,
                            observed_at: now,
                        }));
                    }
                } else if let Some(timer) = timers.remove(&key) {
                    if timer.escalated {
                        events.push(EngineEvent::Recovered(RuleRecoveredEvent {
                            rule_name: rule.name.clone(),
                            metric_name: name.clone(),
                            value: sample.value,
                            observed_at: now,
                        }));
                    }
                }
            }
        }

        events
    }
}

fn violation_message(rule: &AlertRule, unit: &str, value: f64) -> String {
    format!(
        "{} has been {} {:.1}{} for {}s (current: {:.1}{})",
        rule.metric_pattern,
        rule.comparator.describe(),
        rule.threshold,
        unit,
        rule.sustain_secs,
        value,
        unit,
    )
}
