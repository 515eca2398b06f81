// src/runtime/evaluator.rs
//! Rule evaluator
//!
//! Folds a rule's conditions strictly left to right. Each condition joins
//! the running result with its own logical operator; there is no
//! precedence, so `[A, AND B, OR C]` means `(A AND B) OR C` and
//! `[A, OR B, AND C]` means `(A OR B) AND C`.

use crate::compiler::CompiledRule;
use crate::model::LogicalOperator;
use crate::runtime::condition::{ConditionEvaluator, ConditionTrace};
use crate::runtime::context::EvaluationContext;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one rule against one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub rule_id: String,
    pub fired: bool,
    /// Fires of `testing` rules are simulated
    pub simulated: bool,
    pub trace: Vec<ConditionTrace>,
}

impl RuleVerdict {
    /// `(condition id, result)` pairs in declaration order
    pub fn results(&self) -> Vec<(&str, bool)> {
        self.trace
            .iter()
            .map(|t| (t.condition_id.as_str(), t.result))
            .collect()
    }

    /// Conditions that failed to evaluate and were treated as false
    pub fn warnings(&self) -> impl Iterator<Item = &ConditionTrace> {
        self.trace.iter().filter(|t| t.warning.is_some())
    }
}

pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Evaluate a compiled rule.
    ///
    /// With `short_circuit` set, evaluation stops once no remaining
    /// condition can change the result; the rest are traced as skipped.
    pub fn evaluate(rule: &CompiledRule, ctx: &EvaluationContext, short_circuit: bool) -> RuleVerdict {
        let mut trace = Vec::with_capacity(rule.conditions.len());
        let mut acc: Option<bool> = None;

        for (i, condition) in rule.conditions.iter().enumerate() {
            if short_circuit {
                if let Some(current) = acc {
                    if Self::is_settled(current, &rule.conditions[i..]) {
                        trace.extend(rule.conditions[i..].iter().map(ConditionEvaluator::skipped));
                        break;
                    }
                }
            }

            let entry = ConditionEvaluator::evaluate_traced(
                condition,
                ctx,
                &rule.parameters,
                rule.regex_size_limit,
            );
            let b = entry.result;
            trace.push(entry);

            acc = Some(match acc {
                None => b,
                Some(current) => match condition.logic {
                    LogicalOperator::And => current && b,
                    LogicalOperator::Or => current || b,
                },
            });
        }

        let fired = acc.unwrap_or(false);

        tracing::debug!(
            rule_id = %rule.id,
            subject_id = %ctx.subject_id,
            fired,
            conditions = rule.conditions.len(),
            "Rule evaluated"
        );

        RuleVerdict {
            rule_id: rule.id.clone(),
            fired,
            simulated: rule.is_simulated(),
            trace,
        }
    }

    /// True when the remaining conditions cannot move `current`
    fn is_settled(current: bool, remaining: &[crate::compiler::CompiledCondition]) -> bool {
        let absorbing = if current {
            LogicalOperator::Or
        } else {
            LogicalOperator::And
        };
        remaining.iter().all(|c| c.logic == absorbing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompiledCondition, Operand, ParameterTable};
    use crate::model::{ConditionOperator, RuleStatus, RuleVersion, Severity};
    use crate::Value;
    use serde_json::json;

    /// Condition on field `flags.<name>` that is true iff the flag is set
    fn flag(name: &str, logic: LogicalOperator) -> CompiledCondition {
        CompiledCondition {
            id: name.to_string(),
            field: format!("flags.{}", name),
            operator: ConditionOperator::Eq,
            operand: Operand::Literal(Value::Bool(true)),
            logic,
            pattern: None,
        }
    }

    fn rule(conditions: Vec<CompiledCondition>) -> CompiledRule {
        CompiledRule {
            id: "R".to_string(),
            status: RuleStatus::Active,
            severity: Severity::High,
            version: RuleVersion::INITIAL,
            parameters: ParameterTable::default(),
            conditions,
            regex_size_limit: 1 << 20,
        }
    }

    fn subject(a: bool, b: bool, c: bool) -> EvaluationContext {
        EvaluationContext::new("s", json!({"flags": {"a": a, "b": b, "c": c}}))
    }

    #[test]
    fn test_and_then_or() {
        let r = rule(vec![
            flag("a", LogicalOperator::And),
            flag("b", LogicalOperator::And),
            flag("c", LogicalOperator::Or),
        ]);
        assert!(RuleEvaluator::evaluate(&r, &subject(true, false, true), false).fired);
        assert!(!RuleEvaluator::evaluate(&r, &subject(true, false, false), false).fired);
    }

    #[test]
    fn test_or_then_and_has_no_precedence() {
        let r = rule(vec![
            flag("a", LogicalOperator::And),
            flag("b", LogicalOperator::Or),
            flag("c", LogicalOperator::And),
        ]);
        assert!(RuleEvaluator::evaluate(&r, &subject(true, false, true), false).fired);
        // Conventional precedence would give a OR (b AND c) = true here
        assert!(!RuleEvaluator::evaluate(&r, &subject(true, false, false), false).fired);
    }

    #[test]
    fn test_first_operator_is_ignored() {
        let r = rule(vec![flag("a", LogicalOperator::Or)]);
        assert!(RuleEvaluator::evaluate(&r, &subject(true, false, false), false).fired);
        assert!(!RuleEvaluator::evaluate(&r, &subject(false, true, true), false).fired);
    }

    #[test]
    fn test_no_conditions_never_fires() {
        let verdict = RuleEvaluator::evaluate(&rule(vec![]), &subject(true, true, true), true);
        assert!(!verdict.fired);
        assert!(verdict.trace.is_empty());
    }

    #[test]
    fn test_short_circuit_skips_settled_tail() {
        let r = rule(vec![
            flag("a", LogicalOperator::And),
            flag("b", LogicalOperator::And),
            flag("c", LogicalOperator::And),
        ]);
        let verdict = RuleEvaluator::evaluate(&r, &subject(false, true, true), true);

        assert!(!verdict.fired);
        assert_eq!(verdict.trace.len(), 3);
        assert!(verdict.trace[0].evaluated);
        assert!(!verdict.trace[1].evaluated);
        assert!(!verdict.trace[2].evaluated);
    }

    #[test]
    fn test_short_circuit_keeps_going_when_or_can_rescue() {
        let r = rule(vec![
            flag("a", LogicalOperator::And),
            flag("b", LogicalOperator::And),
            flag("c", LogicalOperator::Or),
        ]);
        let verdict = RuleEvaluator::evaluate(&r, &subject(false, false, true), true);

        assert!(verdict.fired);
        assert!(verdict.trace.iter().all(|t| t.evaluated));
    }

    #[test]
    fn test_missing_field_is_isolated_in_or_chain() {
        let mut missing = flag("ghost", LogicalOperator::And);
        missing.field = "no.such.field".to_string();
        let r = rule(vec![missing, flag("a", LogicalOperator::Or)]);

        let verdict = RuleEvaluator::evaluate(&r, &subject(true, false, false), false);
        assert!(verdict.fired);
        assert_eq!(verdict.warnings().count(), 1);
        assert_eq!(verdict.results(), vec![("ghost", false), ("a", true)]);
    }
}
