// src/compiler/program.rs
//! Compiled rule form consumed by the evaluator

use crate::model::{ConditionOperator, LogicalOperator, RuleStatus, RuleVersion, Severity};
use crate::Value;
use ahash::HashMap;
use regex::Regex;

/// Parameter name → typed value
pub type ParameterTable = HashMap<String, Value>;

/// Right-hand operand of a compiled condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Parameter(String),
    Dynamic(String),
}

/// Regex prepared at compile time
#[derive(Debug, Clone)]
pub enum Pattern {
    Compiled(Regex),
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub id: String,
    pub field: String,
    pub operator: ConditionOperator,
    pub operand: Operand,
    /// How this condition joins the accumulated result
    pub logic: LogicalOperator,
    /// Set for `regex` conditions whose pattern was known at compile time
    pub pattern: Option<Pattern>,
}

/// A rule ready for evaluation
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub status: RuleStatus,
    pub severity: Severity,
    pub version: RuleVersion,
    pub parameters: ParameterTable,
    pub conditions: Vec<CompiledCondition>,
    /// Size limit for patterns compiled during evaluation
    pub regex_size_limit: usize,
}

impl CompiledRule {
    /// Whether a fire of this rule is simulated rather than acted on
    pub fn is_simulated(&self) -> bool {
        self.status == RuleStatus::Testing
    }
}
