// src/runtime/mod.rs
//! Runtime components for evaluating compiled rules

pub mod condition;
pub mod context;
pub mod evaluator;
pub mod value;

pub use condition::{ConditionEvaluator, ConditionTrace};
pub use context::EvaluationContext;
pub use evaluator::{RuleEvaluator, RuleVerdict};
pub use value::{Comparison, Value};
