// src/registry/mod.rs
//! In-memory store of rule definitions
//!
//! Writers are serialized behind a write lock and publish a fresh
//! [`RuleSet`] on every change. Readers take an `Arc` to the current set
//! and evaluate against it without holding any lock.

use crate::compiler::{self, CompiledRule};
use crate::model::{AmlRule, RuleStatus, RuleVersion, Severity};
use crate::{EngineConfig, RuleError};
use ahash::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored rule with its compiled form
#[derive(Debug, Clone)]
pub struct RegisteredRule {
    pub definition: AmlRule,
    pub compiled: CompiledRule,
}

/// Immutable view of the registry at one point in time
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, Arc<RegisteredRule>>,
    /// Shared between sets; a write copies only the history it touches
    history: HashMap<String, Arc<Vec<AmlRule>>>,
}

impl RuleSet {
    pub fn get(&self, id: &str) -> Option<&Arc<RegisteredRule>> {
        self.rules.get(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in the given status, ordered by id
    pub fn with_status(&self, status: RuleStatus) -> Vec<Arc<RegisteredRule>> {
        let mut rules: Vec<_> = self
            .rules
            .values()
            .filter(|r| r.definition.status == status)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.definition.id.cmp(&b.definition.id));
        rules
    }

    /// Previous versions of a rule, oldest first
    pub fn history(&self, id: &str) -> &[AmlRule] {
        self.history.get(id).map(|h| h.as_slice()).unwrap_or(&[])
    }
}

/// Summary of a stored rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub id: String,
    pub name: String,
    pub status: RuleStatus,
    pub severity: Severity,
    pub version: RuleVersion,
    pub is_system_rule: bool,
}

/// Persisted form: one record per rule with its version history
#[derive(Debug, Serialize, Deserialize)]
struct StoredRule {
    rule: AmlRule,
    history: Vec<AmlRule>,
}

pub struct RuleRegistry {
    config: EngineConfig,
    current: RwLock<Arc<RuleSet>>,
}

impl RuleRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(RuleSet::default())),
        }
    }

    /// Create a registry holding every rule of a JSON array
    pub fn from_json(json: &str, config: EngineConfig) -> Result<Self, RuleError> {
        let registry = Self::new(config);
        registry.load_json(json)?;
        Ok(registry)
    }

    /// Current rule set. Cheap; never blocks on evaluation.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.current.read())
    }

    /// Insert a new rule or update an existing one.
    ///
    /// New rules start at version 1.0 whatever the definition says; an
    /// update bumps the minor version and keeps the previous definition in
    /// the history. System rules only accept status changes.
    pub fn upsert(&self, rule: AmlRule) -> Result<RuleVersion, RuleError> {
        compiler::validate(&rule, &self.config)?;

        let mut current = self.current.write();
        let mut next = RuleSet::clone(&current);

        let mut rule = rule;
        match next.rules.get(&rule.id) {
            Some(existing) => {
                let previous = &existing.definition;
                if previous.is_system_rule {
                    if previous.differs_beyond_status(&rule) {
                        return Err(RuleError::SystemRuleProtected(rule.id));
                    }
                    rule.version = previous.version;
                } else {
                    if rule.is_system_rule {
                        return Err(RuleError::ValidationFailed {
                            rule_id: rule.id,
                            issues: vec!["an existing rule cannot become a system rule".to_string()],
                        });
                    }
                    rule.version = previous.version.next();
                    let history = Arc::make_mut(next.history.entry(rule.id.clone()).or_default());
                    history.push(previous.clone());
                    let limit = self.config.max_history_per_rule;
                    if history.len() > limit {
                        let excess = history.len() - limit;
                        history.drain(..excess);
                    }
                }
            }
            None => rule.version = RuleVersion::INITIAL,
        }

        let version = rule.version;
        tracing::info!(rule_id = %rule.id, %version, status = %rule.status, "Rule stored");

        let compiled = compiler::compile(&rule, &self.config);
        next.rules.insert(
            rule.id.clone(),
            Arc::new(RegisteredRule {
                definition: rule,
                compiled,
            }),
        );
        *current = Arc::new(next);
        Ok(version)
    }

    /// Change a rule's status. Allowed for system rules too.
    pub fn set_status(&self, id: &str, status: RuleStatus) -> Result<(), RuleError> {
        let mut current = self.current.write();
        let existing = current
            .get(id)
            .ok_or_else(|| RuleError::UnknownRule(id.to_string()))?;

        if existing.definition.status == status {
            return Ok(());
        }

        let mut definition = existing.definition.clone();
        let from = definition.status;
        definition.status = status;
        let compiled = compiler::compile(&definition, &self.config);

        let mut next = RuleSet::clone(&current);
        next.rules.insert(
            id.to_string(),
            Arc::new(RegisteredRule {
                definition,
                compiled,
            }),
        );
        *current = Arc::new(next);

        tracing::info!(rule_id = %id, %from, to = %status, "Rule status changed");
        Ok(())
    }

    /// Remove a rule and its history. System rules cannot be deleted.
    pub fn delete(&self, id: &str) -> Result<AmlRule, RuleError> {
        let mut current = self.current.write();
        let existing = current
            .get(id)
            .ok_or_else(|| RuleError::UnknownRule(id.to_string()))?;

        if existing.definition.is_system_rule {
            return Err(RuleError::SystemRuleProtected(id.to_string()));
        }
        let removed = existing.definition.clone();

        let mut next = RuleSet::clone(&current);
        next.rules.remove(id);
        next.history.remove(id);
        *current = Arc::new(next);

        tracing::info!(rule_id = %id, "Rule deleted");
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<AmlRule> {
        self.snapshot().get(id).map(|r| r.definition.clone())
    }

    /// Previous versions of a rule, oldest first
    pub fn history(&self, id: &str) -> Vec<AmlRule> {
        self.snapshot().history(id).to_vec()
    }

    /// Rules evaluated in production
    pub fn active_rules(&self) -> Vec<Arc<RegisteredRule>> {
        self.snapshot().with_status(RuleStatus::Active)
    }

    /// Rules evaluated in simulation only
    pub fn testing_rules(&self) -> Vec<Arc<RegisteredRule>> {
        self.snapshot().with_status(RuleStatus::Testing)
    }

    /// Metadata for every stored rule, ordered by id
    pub fn list(&self) -> Vec<RuleMetadata> {
        let snapshot = self.snapshot();
        let mut list: Vec<_> = snapshot
            .rules
            .values()
            .map(|r| RuleMetadata {
                id: r.definition.id.clone(),
                name: r.definition.name.clone(),
                status: r.definition.status,
                severity: r.definition.severity,
                version: r.definition.version,
                is_system_rule: r.definition.is_system_rule,
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Upsert every rule of a JSON array. Stops at the first rejected rule;
    /// rules before it stay stored.
    pub fn load_json(&self, json: &str) -> Result<Vec<RuleVersion>, RuleError> {
        let rules: Vec<AmlRule> =
            serde_json::from_str(json).map_err(|e| RuleError::Parse(e.to_string()))?;
        rules.into_iter().map(|rule| self.upsert(rule)).collect()
    }

    /// Serialize every rule with its history for storage
    pub fn export_snapshot(&self) -> Result<Vec<u8>, RuleError> {
        let snapshot = self.snapshot();
        let mut records: Vec<StoredRule> = snapshot
            .rules
            .values()
            .map(|r| StoredRule {
                rule: r.definition.clone(),
                history: snapshot.history(&r.definition.id).to_vec(),
            })
            .collect();
        records.sort_by(|a, b| a.rule.id.cmp(&b.rule.id));

        bincode::serialize(&records).map_err(|e| RuleError::Snapshot(e.to_string()))
    }

    /// Rebuild a registry from [`export_snapshot`](Self::export_snapshot)
    /// output. Stored versions are kept as they were.
    pub fn import_snapshot(data: &[u8], config: EngineConfig) -> Result<Self, RuleError> {
        let records: Vec<StoredRule> =
            bincode::deserialize(data).map_err(|e| RuleError::Snapshot(e.to_string()))?;

        let mut set = RuleSet::default();
        for record in records {
            let compiled = compiler::compile_checked(&record.rule, &config)?;
            if !record.history.is_empty() {
                set.history.insert(record.rule.id.clone(), Arc::new(record.history));
            }
            set.rules.insert(
                record.rule.id.clone(),
                Arc::new(RegisteredRule {
                    definition: record.rule,
                    compiled,
                }),
            );
        }

        Ok(Self {
            config,
            current: RwLock::new(Arc::new(set)),
        })
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
