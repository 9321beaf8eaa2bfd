/// Automation rules
///
/// A rule is a trigger predicate plus an action. The owner (a timer, a file
/// watcher, the REPL) calls `RuleSet::refresh` whenever the dataset changes;
/// the rule set has no scheduler of its own.
///
/// Lifecycle:
/// - Rules are only removed by explicit `remove`
/// - A rule whose columns vanished or changed type incompatibly is
///   deactivated on refresh, with the reason kept for the user
/// - `activate` re-validates before switching a rule back on
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::error::{EngineError, EngineResult};
use crate::execution::Executor;
use crate::metadata::Schema;
use crate::query::{decode_predicate, revalidate, serialize_predicate, Predicate};

/// What happens to the rows a rule selects
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionSpec {
    Highlight,
    Filter,
    Notify { message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    pub name: String,
    pub trigger: Predicate,
    pub action: ActionSpec,
    pub active: bool,
    /// Why the rule was switched off, when it was
    pub deactivation_reason: Option<String>,
    pub created_at: String,
}

impl AutomationRule {
    pub fn new(name: impl Into<String>, trigger: Predicate, action: ActionSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            trigger,
            action,
            active: true,
            deactivation_reason: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Result of one rule on one refresh
#[derive(Clone, Debug, PartialEq)]
pub enum RuleStatus {
    /// Trigger evaluated; `rows` may be empty
    Fired { action: ActionSpec, rows: Vec<usize> },
    /// Trigger no longer fits the dataset; the rule was switched off
    Deactivated { error: EngineError },
    /// Evaluation failed for another reason; the rule stays active
    Failed { error: EngineError },
    Inactive,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuleOutcome {
    pub rule_id: Uuid,
    pub name: String,
    pub status: RuleStatus,
}

/// Persisted form: the trigger travels as plain JSON
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedRule {
    pub id: Uuid,
    pub name: String,
    pub trigger: Value,
    pub action: ActionSpec,
    pub active: bool,
    #[serde(default)]
    pub deactivation_reason: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

pub struct RuleSet {
    rules: Vec<AutomationRule>,
    executor: Executor,
}

impl RuleSet {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rules: Vec::new(),
            executor: Executor::new(config),
        }
    }

    pub fn rules(&self) -> &[AutomationRule] {
        &self.rules
    }

    pub fn get(&self, id: Uuid) -> Option<&AutomationRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Register a new active rule
    pub fn add(&mut self, name: impl Into<String>, trigger: Predicate, action: ActionSpec) -> EngineResult<Uuid> {
        trigger.validate()?;
        let rule = AutomationRule::new(name, trigger, action);
        let id = rule.id;
        info!(rule_id = %id, name = %rule.name, "automation rule added");
        self.rules.push(rule);
        Ok(id)
    }

    /// Insert a fully built rule (presets, restores)
    pub fn insert(&mut self, rule: AutomationRule) -> Uuid {
        let id = rule.id;
        self.rules.retain(|r| r.id != id);
        self.rules.push(rule);
        id
    }

    /// Switch a rule off. Returns false for an unknown id.
    pub fn deactivate(&mut self, id: Uuid, reason: impl Into<String>) -> bool {
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.active = false;
                rule.deactivation_reason = Some(reason.into());
                true
            }
            None => false,
        }
    }

    /// Switch a rule back on after checking its trigger against `schema`.
    /// Returns Ok(false) for an unknown id.
    pub fn activate(&mut self, id: Uuid, schema: &Schema) -> EngineResult<bool> {
        let Some(rule) = self.rules.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        let trigger = revalidate(&rule.trigger, schema).map_err(|e| e.for_rule(id.to_string()))?;
        rule.trigger = trigger;
        rule.active = true;
        rule.deactivation_reason = None;
        Ok(true)
    }

    /// Delete a rule. This is the only way a rule leaves the set.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        self.rules.len() != before
    }

    /// Re-evaluate every active rule against a refreshed dataset.
    /// Each rule succeeds or fails on its own.
    pub fn refresh(&mut self, dataset: &Dataset, schema: &Schema) -> Vec<RuleOutcome> {
        let executor = &self.executor;
        self.rules
            .iter_mut()
            .map(|rule| {
                let status = if !rule.active {
                    RuleStatus::Inactive
                } else {
                    match revalidate(&rule.trigger, schema) {
                        Err(error) => {
                            let error = error.for_rule(rule.id.to_string());
                            warn!(rule_id = %rule.id, error = %error, "automation rule deactivated");
                            rule.active = false;
                            rule.deactivation_reason = Some(error.to_string());
                            RuleStatus::Deactivated { error }
                        }
                        Ok(trigger) => match executor.evaluate(&trigger, dataset) {
                            Ok(selection) => {
                                debug!(rule_id = %rule.id, matched = selection.count(), "automation rule fired");
                                rule.trigger = trigger;
                                RuleStatus::Fired {
                                    action: rule.action.clone(),
                                    rows: selection.indices(),
                                }
                            }
                            Err(error) => RuleStatus::Failed { error },
                        },
                    }
                };
                RuleOutcome {
                    rule_id: rule.id,
                    name: rule.name.clone(),
                    status,
                }
            })
            .collect()
    }

    /// Plain-JSON array of every rule, active or not
    pub fn export(&self) -> EngineResult<Value> {
        let mut exported = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let persisted = PersistedRule {
                id: rule.id,
                name: rule.name.clone(),
                trigger: serialize_predicate(&rule.trigger),
                action: rule.action.clone(),
                active: rule.active,
                deactivation_reason: rule.deactivation_reason.clone(),
                created_at: rule.created_at.clone(),
            };
            let value = serde_json::to_value(persisted)
                .map_err(|e| EngineError::internal(format!("rule {} failed to serialize: {}", rule.id, e)))?;
            exported.push(value);
        }
        Ok(Value::Array(exported))
    }

    /// True when a rule with this name and trigger is already registered
    pub fn contains_equivalent(&self, name: &str, trigger: &Predicate) -> bool {
        self.rules.iter().any(|r| r.name == name && &r.trigger == trigger)
    }

    /// Load rules exported earlier. Rules that no longer fit `schema` are
    /// kept but deactivated. Entries that cannot be decoded at all are
    /// skipped. Both kinds of error are returned so the user can be told.
    ///
    /// Only an export that is not a JSON array fails the whole call.
    pub fn restore(&mut self, exported: &Value, schema: &Schema) -> EngineResult<Vec<EngineError>> {
        let entries = exported
            .as_array()
            .ok_or_else(|| EngineError::stale_rule("restore", "malformed rule export: expected an array of rules"))?;

        let mut stale = Vec::new();
        for (position, raw) in entries.iter().enumerate() {
            let entry: PersistedRule = match serde_json::from_value(raw.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    let label = raw
                        .get("id")
                        .and_then(Value::as_str)
                        .map_or_else(|| format!("entry {}", position), str::to_string);
                    warn!(rule = %label, error = %e, "skipping malformed rule");
                    stale.push(EngineError::stale_rule(label, format!("malformed rule export: {}", e)));
                    continue;
                }
            };
            let id = entry.id.to_string();
            let trigger = match decode_predicate(&entry.trigger) {
                Ok(trigger) => trigger,
                Err(error) => {
                    let error = error.for_rule(id);
                    warn!(rule_id = %entry.id, error = %error, "skipping rule with undecodable trigger");
                    stale.push(error);
                    continue;
                }
            };
            let mut rule = AutomationRule {
                id: entry.id,
                name: entry.name,
                trigger,
                action: entry.action,
                active: entry.active,
                deactivation_reason: entry.deactivation_reason,
                created_at: entry.created_at,
            };
            match revalidate(&rule.trigger, schema) {
                Ok(trigger) => rule.trigger = trigger,
                Err(error) => {
                    let error = error.for_rule(id);
                    rule.active = false;
                    rule.deactivation_reason = Some(error.to_string());
                    stale.push(error);
                }
            }
            self.insert(rule);
        }
        info!(rules = self.rules.len(), stale = stale.len(), "automation rules restored");
        Ok(stale)
    }
}
