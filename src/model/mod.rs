// src/model/mod.rs
//! Rule definition data model
//!
//! These are the shapes rules are authored and stored in. They are
//! validated and compiled by [`crate::compiler`] before evaluation.

pub mod rule;
pub mod version;

pub use rule::{
    ActionType, AmlRule, ConditionOperator, DataType, LogicalOperator, RuleAction, RuleCondition,
    RuleParameter, RuleStatus, Severity, ValueType,
};
pub use version::RuleVersion;
