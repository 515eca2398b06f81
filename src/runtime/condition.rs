// src/runtime/condition.rs
//! Condition evaluator
//!
//! Resolves both operands of a condition and applies its operator. Errors
//! are returned to the caller; the rule evaluator turns them into a `false`
//! result with a warning so one malformed condition cannot block a rule set.

use crate::compiler::build_regex;
use crate::compiler::{CompiledCondition, Operand, ParameterTable, Pattern};
use crate::model::ConditionOperator;
use crate::runtime::context::EvaluationContext;
use crate::{Comparison, EvalError, Value};
use serde::{Deserialize, Serialize};

/// Audit record of one condition's evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionTrace {
    pub condition_id: String,
    pub field: String,
    pub operator: ConditionOperator,
    /// Resolved subject value, when it could be resolved
    pub left: Option<Value>,
    /// Resolved operand, when it could be resolved
    pub right: Option<Value>,
    pub result: bool,
    /// False when short-circuiting made the condition irrelevant
    pub evaluated: bool,
    #[serde(default)]
    pub warning: Option<String>,
}

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate a condition to a boolean
    pub fn evaluate(
        condition: &CompiledCondition,
        ctx: &EvaluationContext,
        parameters: &ParameterTable,
        regex_size_limit: usize,
    ) -> Result<bool, EvalError> {
        let left = ctx.field(&condition.field)?;
        let right = Self::resolve_operand(&condition.operand, ctx, parameters)?;
        Self::apply(condition, left, &right, regex_size_limit)
    }

    /// Evaluate a condition and record operands and outcome
    pub fn evaluate_traced(
        condition: &CompiledCondition,
        ctx: &EvaluationContext,
        parameters: &ParameterTable,
        regex_size_limit: usize,
    ) -> ConditionTrace {
        let left = ctx.field(&condition.field);
        let right = Self::resolve_operand(&condition.operand, ctx, parameters);

        let outcome = match (&left, &right) {
            (Ok(l), Ok(r)) => Self::apply(condition, l.clone(), r, regex_size_limit),
            (Err(e), _) | (_, Err(e)) => Err(e.clone()),
        };

        let (result, warning) = match outcome {
            Ok(b) => (b, None),
            Err(e) => {
                tracing::warn!(
                    condition_id = %condition.id,
                    field = %condition.field,
                    subject_id = %ctx.subject_id,
                    error = %e,
                    "Condition failed, treating as false"
                );
                (false, Some(e.to_string()))
            }
        };

        ConditionTrace {
            condition_id: condition.id.clone(),
            field: condition.field.clone(),
            operator: condition.operator,
            left: left.ok(),
            right: right.ok(),
            result,
            evaluated: true,
            warning,
        }
    }

    /// Trace entry for a condition that was not evaluated
    pub fn skipped(condition: &CompiledCondition) -> ConditionTrace {
        ConditionTrace {
            condition_id: condition.id.clone(),
            field: condition.field.clone(),
            operator: condition.operator,
            left: None,
            right: None,
            result: false,
            evaluated: false,
            warning: None,
        }
    }

    fn resolve_operand(
        operand: &Operand,
        ctx: &EvaluationContext,
        parameters: &ParameterTable,
    ) -> Result<Value, EvalError> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Parameter(name) => parameters
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::ParameterNotFound(name.clone())),
            Operand::Dynamic(name) => ctx.dynamic(name),
        }
    }

    fn apply(
        condition: &CompiledCondition,
        left: Value,
        right: &Value,
        regex_size_limit: usize,
    ) -> Result<bool, EvalError> {
        let op = condition.operator;
        match op {
            ConditionOperator::Eq => Ok(left.align_to(right) == *right),
            ConditionOperator::Ne => Ok(left.align_to(right) != *right),

            ConditionOperator::Gt | ConditionOperator::Lt | ConditionOperator::Gte | ConditionOperator::Lte => {
                let ordering = ordered(&left.align_to(right), right, op)?;
                Ok(match op {
                    ConditionOperator::Gt => ordering == Comparison::Greater,
                    ConditionOperator::Lt => ordering == Comparison::Less,
                    ConditionOperator::Gte => ordering != Comparison::Less,
                    _ => ordering != Comparison::Greater,
                })
            }

            ConditionOperator::Contains => left.contains(right),
            ConditionOperator::NotContains => left.contains(right).map(|found| !found),

            ConditionOperator::In | ConditionOperator::NotIn => {
                let items = right.as_list().ok_or_else(|| {
                    EvalError::TypeMismatch(format!("`{}` needs a list operand, got {}", op, right.kind()))
                })?;
                let left = match items.first() {
                    Some(first) => left.align_to(first),
                    None => left,
                };
                let found = items.contains(&left);
                Ok(if op == ConditionOperator::In { found } else { !found })
            }

            ConditionOperator::Between => {
                let (low, high) = match right.as_list() {
                    Some([low, high]) => (low, high),
                    Some(bounds) => {
                        return Err(EvalError::InvalidOperand(format!(
                            "`between` needs exactly two bounds, got {}",
                            bounds.len()
                        )))
                    }
                    None => {
                        return Err(EvalError::InvalidOperand(format!(
                            "`between` needs a [low, high] list, got {}",
                            right.kind()
                        )))
                    }
                };
                let left = left.align_to(low);
                let above_low = ordered(low, &left, op)? != Comparison::Greater;
                let below_high = ordered(&left, high, op)? != Comparison::Greater;
                Ok(above_low && below_high)
            }

            ConditionOperator::Regex => {
                let text = left.as_text().ok_or_else(|| {
                    EvalError::TypeMismatch(format!("`regex` needs a string field, got {}", left.kind()))
                })?;
                match &condition.pattern {
                    Some(Pattern::Compiled(re)) => Ok(re.is_match(text)),
                    Some(Pattern::Invalid(e)) => Err(EvalError::InvalidOperand(e.clone())),
                    None => {
                        let source = right.as_text().ok_or_else(|| {
                            EvalError::TypeMismatch(format!(
                                "`regex` needs a string pattern, got {}",
                                right.kind()
                            ))
                        })?;
                        let re = build_regex(source, regex_size_limit).map_err(EvalError::InvalidOperand)?;
                        Ok(re.is_match(text))
                    }
                }
            }
        }
    }
}

fn ordered(a: &Value, b: &Value, op: ConditionOperator) -> Result<Comparison, EvalError> {
    match a.compare(b) {
        Comparison::Incomparable => Err(EvalError::TypeMismatch(format!(
            "`{}` cannot compare {} with {}",
            op,
            a.kind(),
            b.kind()
        ))),
        ordering => Ok(ordering),
    }
}
