// src/compiler/mod.rs
//! Compiler that validates rule definitions and prepares them for
//! evaluation

pub mod compiler;
pub mod program;

use crate::model::AmlRule;
use crate::{EngineConfig, RuleError};

pub use compiler::{build_regex, check_operand, typed_value};
pub use program::{CompiledCondition, CompiledRule, Operand, ParameterTable, Pattern};

/// Validate a rule against every stored-rule invariant
pub fn validate(rule: &AmlRule, config: &EngineConfig) -> Result<(), RuleError> {
    compiler::Compiler::new(config).validate(rule)
}

/// Compile a rule for evaluation without validating it first
pub fn compile(rule: &AmlRule, config: &EngineConfig) -> CompiledRule {
    compiler::Compiler::new(config).compile_rule(rule)
}

/// Validate, then compile
pub fn compile_checked(rule: &AmlRule, config: &EngineConfig) -> Result<CompiledRule, RuleError> {
    validate(rule, config)?;
    Ok(compile(rule, config))
}
