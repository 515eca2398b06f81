// src/tracker/mod.rs
//! Per-rule effectiveness tracking
//!
//! Triggers are recorded when a rule fires; outcome labels arrive later from
//! a reviewer or downstream system. Efficiency is always derived from the
//! counters and never stored.

use crate::RuleError;
use ahash::HashMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Running counters for one rule. Serialized forms carry the derived
/// `efficiency` alongside the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "EffectivenessRecord", from = "EffectivenessRecord")]
pub struct RuleEffectiveness {
    pub rule_id: String,
    pub total_triggers: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl RuleEffectiveness {
    fn new(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            total_triggers: 0,
            true_positives: 0,
            false_positives: 0,
            last_triggered: None,
        }
    }

    /// True positives over total triggers; `None` before the first trigger
    pub fn efficiency(&self) -> Option<f64> {
        if self.total_triggers == 0 {
            None
        } else {
            Some(self.true_positives as f64 / self.total_triggers as f64)
        }
    }

    /// Triggers still waiting for an outcome label
    pub fn pending(&self) -> u64 {
        self.total_triggers
            .saturating_sub(self.true_positives + self.false_positives)
    }
}

/// Wire form of [`RuleEffectiveness`]. `efficiency` is recomputed on the
/// way out and ignored on the way in.
#[derive(Serialize, Deserialize)]
struct EffectivenessRecord {
    rule_id: String,
    total_triggers: u64,
    true_positives: u64,
    false_positives: u64,
    last_triggered: Option<DateTime<Utc>>,
    #[serde(default)]
    efficiency: Option<f64>,
}

impl From<RuleEffectiveness> for EffectivenessRecord {
    fn from(stats: RuleEffectiveness) -> Self {
        Self {
            efficiency: stats.efficiency(),
            rule_id: stats.rule_id,
            total_triggers: stats.total_triggers,
            true_positives: stats.true_positives,
            false_positives: stats.false_positives,
            last_triggered: stats.last_triggered,
        }
    }
}

impl From<EffectivenessRecord> for RuleEffectiveness {
    fn from(record: EffectivenessRecord) -> Self {
        Self {
            rule_id: record.rule_id,
            total_triggers: record.total_triggers,
            true_positives: record.true_positives,
            false_positives: record.false_positives,
            last_triggered: record.last_triggered,
        }
    }
}

/// Thread-safe store of per-rule counters
#[derive(Debug, Default)]
pub struct EffectivenessTracker {
    stats: Mutex<HashMap<String, RuleEffectiveness>>,
}

impl EffectivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a fire of `rule_id`
    pub fn record_trigger(&self, rule_id: &str, triggered_at: DateTime<Utc>) -> RuleEffectiveness {
        let mut stats = self.stats.lock();
        let entry = stats
            .entry(rule_id.to_string())
            .or_insert_with(|| RuleEffectiveness::new(rule_id));

        entry.total_triggers += 1;
        // Triggers from concurrent workers can arrive out of order
        if entry.last_triggered.map_or(true, |last| triggered_at > last) {
            entry.last_triggered = Some(triggered_at);
        }
        entry.clone()
    }

    /// Label one trigger of `rule_id` as helpful (true positive) or not.
    ///
    /// Fails with `UnknownRule` if the rule never triggered, and with
    /// `OutcomeWithoutPendingTrigger` if every trigger is already labeled.
    pub fn record_outcome(&self, rule_id: &str, is_helpful: bool) -> Result<RuleEffectiveness, RuleError> {
        let mut stats = self.stats.lock();
        let entry = stats
            .get_mut(rule_id)
            .ok_or_else(|| RuleError::UnknownRule(rule_id.to_string()))?;

        if entry.pending() == 0 {
            return Err(RuleError::OutcomeWithoutPendingTrigger(rule_id.to_string()));
        }

        if is_helpful {
            entry.true_positives += 1;
        } else {
            entry.false_positives += 1;
        }
        Ok(entry.clone())
    }

    pub fn get(&self, rule_id: &str) -> Option<RuleEffectiveness> {
        self.stats.lock().get(rule_id).cloned()
    }

    /// Snapshot of every rule's counters, ordered by rule id
    pub fn all(&self) -> Vec<RuleEffectiveness> {
        let mut all: Vec<_> = self.stats.lock().values().cloned().collect();
        all.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        all
    }

    /// Drop the counters of a deleted rule
    pub fn forget(&self, rule_id: &str) -> Option<RuleEffectiveness> {
        self.stats.lock().remove(rule_id)
    }

    /// Serialize all counters for storage
    pub fn export_snapshot(&self) -> Result<Vec<u8>, RuleError> {
        bincode::serialize(&self.all()).map_err(|e| RuleError::Snapshot(e.to_string()))
    }

    /// Rebuild a tracker from [`export_snapshot`](Self::export_snapshot) output
    pub fn import_snapshot(data: &[u8]) -> Result<Self, RuleError> {
        let records: Vec<RuleEffectiveness> =
            bincode::deserialize(data).map_err(|e| RuleError::Snapshot(e.to_string()))?;
        let stats = records
            .into_iter()
            .map(|r| (r.rule_id.clone(), r))
            .collect();
        Ok(Self {
            stats: Mutex::new(stats),
        })
    }
}
