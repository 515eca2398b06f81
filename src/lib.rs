// src/lib.rs
//! # AML Rule Engine
//!
//! Evaluates declarative anti-money-laundering rules (parameters,
//! conditions, actions) against transaction or event records, emits the
//! action requests of fired rules and tracks how often each rule's alerts
//! turn out to be true positives.
//!
//! Evaluation is pure and synchronous. The engine never performs side
//! effects: fired rules produce [`ActionRequest`]s for the caller to route.
//!
//! ## Example
//!
//! ```rust
//! use aml_rule_engine::{AmlEngine, AmlRule, ConditionOperator, EngineConfig, EvaluationContext, RuleCondition, RuleStatus};
//! use serde_json::json;
//!
//! let engine = AmlEngine::new(EngineConfig::default());
//! engine
//!     .registry()
//!     .upsert(
//!         AmlRule::new("R-100", "Large transaction", "Amount above 10k")
//!             .with_status(RuleStatus::Active)
//!             .with_condition(RuleCondition::new("c1", "amount", ConditionOperator::Gt, 10000)),
//!     )
//!     .unwrap();
//!
//! let ctx = EvaluationContext::new("txn-1", json!({"amount": 15000}));
//! let result = engine.screen_now(&ctx);
//! assert_eq!(result.metadata.fired_rules, vec!["R-100".to_string()]);
//! ```

pub mod actions;
pub mod compiler;
pub mod config;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod tracker;

use ahash::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use actions::{ActionDispatcher, ActionRequest, ActionSink, RoutingSummary};
pub use compiler::CompiledRule;
pub use config::{ConfigError, EngineConfig};
pub use model::{
    ActionType, AmlRule, ConditionOperator, DataType, LogicalOperator, RuleAction, RuleCondition,
    RuleParameter, RuleStatus, RuleVersion, Severity, ValueType,
};
pub use registry::{RegisteredRule, RuleMetadata, RuleRegistry, RuleSet};
pub use runtime::{
    Comparison, ConditionEvaluator, ConditionTrace, EvaluationContext, RuleEvaluator, RuleVerdict,
    Value,
};
pub use tracker::{EffectivenessTracker, RuleEffectiveness};

/// Condition-level errors. The evaluator recovers from these by treating
/// the condition as false.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Dynamic value not resolved: {0}")]
    DynamicValueNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid operand: {0}")]
    InvalidOperand(String),
}

/// Registry, tracker and loading errors, surfaced to the caller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Rule {0} is a system rule and cannot be modified or deleted")]
    SystemRuleProtected(String),

    #[error("Validation failed for rule {rule_id}: {}", .issues.join("; "))]
    ValidationFailed { rule_id: String, issues: Vec<String> },

    #[error("Rule {0} has no unlabeled trigger")]
    OutcomeWithoutPendingTrigger(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Record of a rule firing for one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTriggerEvent {
    pub rule_id: String,
    pub subject_id: String,
    pub fired_at: DateTime<Utc>,
    pub simulated: bool,
    pub condition_trace: Vec<ConditionTrace>,
}

/// Result of screening one subject against the registry
#[derive(Debug, Clone)]
pub struct ScreeningResult {
    /// One verdict per evaluated rule
    pub verdicts: Vec<RuleVerdict>,

    /// One event per fired rule
    pub triggers: Vec<RuleTriggerEvent>,

    /// Requests from fired rules (caller must route these)
    pub actions: Vec<ActionRequest>,

    pub metadata: ScreeningMetadata,
}

impl ScreeningResult {
    /// Forward real requests to `sink`; simulated ones are only logged
    pub fn route<S: ActionSink + ?Sized>(&self, sink: &S) -> RoutingSummary {
        ActionDispatcher::route(&self.actions, sink)
    }
}

/// Metadata about a screening pass
#[derive(Debug, Clone)]
pub struct ScreeningMetadata {
    /// Rules that were evaluated
    pub evaluated_rules: Vec<String>,

    /// Rules that fired, simulated fires included
    pub fired_rules: Vec<String>,

    /// Evaluation time per rule
    pub rule_timings: HashMap<String, std::time::Duration>,

    /// Total screening time
    pub total_duration: std::time::Duration,
}

/// Registry, tracker and configuration bundled for screening
#[derive(Clone)]
pub struct AmlEngine {
    config: Arc<EngineConfig>,
    registry: Arc<RuleRegistry>,
    tracker: Arc<EffectivenessTracker>,
}

impl AmlEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(RuleRegistry::new(config.clone())),
            tracker: Arc::new(EffectivenessTracker::new()),
            config: Arc::new(config),
        }
    }

    /// Create an engine from a JSON array of rule definitions
    pub fn from_json(rules_json: &str, config: EngineConfig) -> Result<Self, RuleError> {
        let engine = Self::new(config);
        engine.registry.load_json(rules_json)?;
        Ok(engine)
    }

    /// Assemble an engine around existing stores (e.g. restored snapshots)
    pub fn with_stores(config: EngineConfig, registry: RuleRegistry, tracker: EffectivenessTracker) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            tracker: Arc::new(tracker),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &EffectivenessTracker {
        &self.tracker
    }

    /// Evaluate one rule definition, stored or not, against a subject.
    /// Has no effect on the tracker.
    pub fn evaluate(&self, rule: &AmlRule, ctx: &EvaluationContext) -> RuleVerdict {
        let compiled = compiler::compile(rule, &self.config);
        RuleEvaluator::evaluate(&compiled, ctx, self.config.short_circuit)
    }

    /// Screen a subject against every active rule (and testing rule, if
    /// configured). Fired rules dispatch their actions and count a trigger.
    pub fn screen(&self, ctx: &EvaluationContext, at: DateTime<Utc>) -> ScreeningResult {
        let start = std::time::Instant::now();

        let snapshot = self.registry.snapshot();
        let mut candidates = snapshot.with_status(RuleStatus::Active);
        if self.config.evaluate_testing_rules {
            candidates.extend(snapshot.with_status(RuleStatus::Testing));
        }

        let mut verdicts = Vec::with_capacity(candidates.len());
        let mut triggers = Vec::new();
        let mut actions = Vec::new();
        let mut metadata = ScreeningMetadata {
            evaluated_rules: Vec::with_capacity(candidates.len()),
            fired_rules: Vec::new(),
            rule_timings: HashMap::default(),
            total_duration: std::time::Duration::ZERO,
        };

        for rule in &candidates {
            let rule_start = std::time::Instant::now();
            let verdict = RuleEvaluator::evaluate(&rule.compiled, ctx, self.config.short_circuit);

            let id = &rule.definition.id;
            metadata.evaluated_rules.push(id.clone());
            metadata.rule_timings.insert(id.clone(), rule_start.elapsed());

            if verdict.fired {
                metadata.fired_rules.push(id.clone());
                actions.extend(ActionDispatcher::dispatch(&rule.definition, &ctx.subject_id));

                if !verdict.simulated || self.config.record_testing_triggers {
                    self.tracker.record_trigger(id, at);
                }
                triggers.push(RuleTriggerEvent {
                    rule_id: id.clone(),
                    subject_id: ctx.subject_id.clone(),
                    fired_at: at,
                    simulated: verdict.simulated,
                    condition_trace: verdict.trace.clone(),
                });
            }
            verdicts.push(verdict);
        }

        metadata.total_duration = start.elapsed();
        tracing::debug!(
            subject_id = %ctx.subject_id,
            evaluated = metadata.evaluated_rules.len(),
            fired = metadata.fired_rules.len(),
            "Subject screened"
        );

        ScreeningResult {
            verdicts,
            triggers,
            actions,
            metadata,
        }
    }

    /// [`screen`](Self::screen) stamped with the current time
    pub fn screen_now(&self, ctx: &EvaluationContext) -> ScreeningResult {
        self.screen(ctx, Utc::now())
    }

    /// Label a trigger of `rule_id` as a true or false positive
    pub fn record_outcome(&self, rule_id: &str, is_helpful: bool) -> Result<RuleEffectiveness, RuleError> {
        self.tracker.record_outcome(rule_id, is_helpful)
    }

    pub fn effectiveness(&self, rule_id: &str) -> Option<RuleEffectiveness> {
        self.tracker.get(rule_id)
    }

    /// Delete a rule together with its effectiveness counters
    pub fn delete_rule(&self, rule_id: &str) -> Result<AmlRule, RuleError> {
        let removed = self.registry.delete(rule_id)?;
        self.tracker.forget(rule_id);
        Ok(removed)
    }
}

impl Default for AmlEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn large_amount(status: RuleStatus) -> AmlRule {
        AmlRule::new("R-100", "Large transaction", "Amount above 10k")
            .with_status(status)
            .with_condition(RuleCondition::new("c1", "amount", ConditionOperator::Gt, 10000))
            .with_action(RuleAction::new("a1", ActionType::Alert))
    }

    #[test]
    fn test_screen_fires_and_counts() {
        let engine = AmlEngine::default();
        engine.registry().upsert(large_amount(RuleStatus::Active)).unwrap();

        let result = engine.screen_now(&EvaluationContext::new("t1", json!({"amount": 15000})));

        assert_eq!(result.verdicts.len(), 1);
        assert_eq!(result.triggers.len(), 1);
        assert_eq!(result.actions.len(), 1);
        assert!(!result.actions[0].simulated);
        assert_eq!(engine.effectiveness("R-100").unwrap().total_triggers, 1);
    }

    #[test]
    fn test_inactive_rules_are_not_screened() {
        let engine = AmlEngine::default();
        engine.registry().upsert(large_amount(RuleStatus::Inactive)).unwrap();

        let result = engine.screen_now(&EvaluationContext::new("t1", json!({"amount": 15000})));

        assert!(result.verdicts.is_empty());
        assert!(engine.effectiveness("R-100").is_none());
    }

    #[test]
    fn test_testing_rules_can_be_excluded() {
        let config = EngineConfig {
            evaluate_testing_rules: false,
            ..EngineConfig::default()
        };
        let engine = AmlEngine::new(config);
        engine.registry().upsert(large_amount(RuleStatus::Testing)).unwrap();

        let result = engine.screen_now(&EvaluationContext::new("t1", json!({"amount": 15000})));
        assert!(result.verdicts.is_empty());
    }

    #[test]
    fn test_simulated_triggers_can_skip_the_tracker() {
        let config = EngineConfig {
            record_testing_triggers: false,
            ..EngineConfig::default()
        };
        let engine = AmlEngine::new(config);
        engine.registry().upsert(large_amount(RuleStatus::Testing)).unwrap();

        let result = engine.screen_now(&EvaluationContext::new("t1", json!({"amount": 15000})));

        assert_eq!(result.triggers.len(), 1);
        assert!(result.triggers[0].simulated);
        assert!(engine.effectiveness("R-100").is_none());
    }

    #[test]
    fn test_delete_rule_forgets_counters() {
        let engine = AmlEngine::default();
        engine.registry().upsert(large_amount(RuleStatus::Active)).unwrap();
        engine.screen_now(&EvaluationContext::new("t1", json!({"amount": 15000})));

        engine.delete_rule("R-100").unwrap();
        assert!(engine.effectiveness("R-100").is_none());
    }

    #[test]
    fn test_invalid_regex_in_unstored_rule_fails_open() {
        let engine = AmlEngine::default();
        let rule = AmlRule::new("R-RX", "Memo pattern", "Broken pattern")
            .with_condition(RuleCondition::new("c1", "memo", ConditionOperator::Regex, "(split"))
            .with_condition(
                RuleCondition::new("c2", "amount", ConditionOperator::Gt, 100)
                    .joined_by(LogicalOperator::Or),
            );

        let quiet = engine.evaluate(&rule, &EvaluationContext::new("t1", json!({"memo": "split", "amount": 5})));
        assert!(!quiet.fired);
        assert_eq!(quiet.results(), vec![("c1", false), ("c2", false)]);
        assert_eq!(quiet.warnings().count(), 1);
        assert_eq!(quiet.warnings().next().unwrap().condition_id, "c1");

        // The broken condition does not block the rest of the rule
        let loud = engine.evaluate(&rule, &EvaluationContext::new("t2", json!({"memo": "split", "amount": 500})));
        assert!(loud.fired);
    }

    #[test]
    fn test_validation_error_message_lists_issues() {
        let err = RuleError::ValidationFailed {
            rule_id: "R".to_string(),
            issues: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Validation failed for rule R: a; b");
    }
}
