// src/model/rule.rs
//! Rule definitions as authored by compliance administrators

use crate::model::RuleVersion;
use crate::Value;
use ahash::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a rule parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Number,
    String,
    Boolean,
    Date,
    List,
}

/// Named, typed threshold a rule's conditions can refer to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleParameter {
    pub id: String,
    pub name: String,
    pub data_type: DataType,
    pub value: Value,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub options: Option<Vec<Value>>,
}

impl RuleParameter {
    pub fn new(name: impl Into<String>, data_type: DataType, value: impl Into<Value>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            data_type,
            value: value.into(),
            min_value: None,
            max_value: None,
            options: None,
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = Some(options);
        self
    }
}

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_contains")]
    NotContains,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "regex")]
    Regex,
}

impl ConditionOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ConditionOperator::Eq => "=",
            ConditionOperator::Ne => "!=",
            ConditionOperator::Gt => ">",
            ConditionOperator::Lt => "<",
            ConditionOperator::Gte => ">=",
            ConditionOperator::Lte => "<=",
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "not_contains",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not_in",
            ConditionOperator::Between => "between",
            ConditionOperator::Regex => "regex",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Where a condition's right-hand operand comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// `value` is the literal operand
    #[default]
    Static,
    /// `value` names a rule parameter
    Parameter,
    /// `value` names a contextual value supplied by the caller
    Dynamic,
}

/// How a condition joins the result of the conditions before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Single comparison test within a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub id: String,
    /// Dot-path into the subject record
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub logical_operator: Option<LogicalOperator>,
}

impl RuleCondition {
    /// Condition against a literal operand
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            operator,
            value: value.into(),
            value_type: ValueType::Static,
            logical_operator: None,
        }
    }

    /// Condition against a named rule parameter
    pub fn against_parameter(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: ConditionOperator,
        parameter: impl Into<String>,
    ) -> Self {
        Self {
            value_type: ValueType::Parameter,
            ..Self::new(id, field, operator, Value::Text(parameter.into()))
        }
    }

    /// Condition against a caller-resolved contextual value
    pub fn against_dynamic(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: ConditionOperator,
        name: impl Into<String>,
    ) -> Self {
        Self {
            value_type: ValueType::Dynamic,
            ..Self::new(id, field, operator, Value::Text(name.into()))
        }
    }

    pub fn joined_by(mut self, op: LogicalOperator) -> Self {
        self.logical_operator = Some(op);
        self
    }

    /// Joining operator, `AND` when unspecified
    pub fn logic(&self) -> LogicalOperator {
        self.logical_operator.unwrap_or_default()
    }
}

/// Side effect requested when a rule fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Alert,
    Block,
    Escalate,
    Verify,
    Notify,
    Log,
    #[serde(alias = "reduce-limits")]
    ReduceLimits,
}

/// Action descriptor attached to a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    pub id: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RuleAction {
    pub fn new(id: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            id: id.into(),
            action_type,
            parameters: HashMap::default(),
            description: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle status of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Active,
    #[default]
    Inactive,
    Testing,
    Archived,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleStatus::Active => "active",
            RuleStatus::Inactive => "inactive",
            RuleStatus::Testing => "testing",
            RuleStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A complete AML detection rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmlRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rule_type: String,
    pub category: String,
    #[serde(default)]
    pub status: RuleStatus,
    pub severity: Severity,
    #[serde(default)]
    pub parameters: Vec<RuleParameter>,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub version: RuleVersion,
    #[serde(default)]
    pub is_system_rule: bool,
}

impl AmlRule {
    /// Start a rule definition. The rule is `inactive` until its status is
    /// changed explicitly.
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            rule_type: "transaction_monitoring".to_string(),
            category: "general".to_string(),
            status: RuleStatus::Inactive,
            severity: Severity::Medium,
            parameters: Vec::new(),
            conditions: Vec::new(),
            actions: Vec::new(),
            version: RuleVersion::INITIAL,
            is_system_rule: false,
        }
    }

    /// Parse a single rule from JSON
    pub fn from_json(json: &str) -> Result<Self, crate::RuleError> {
        serde_json::from_str(json).map_err(|e| crate::RuleError::Parse(e.to_string()))
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, rule_type: impl Into<String>, category: impl Into<String>) -> Self {
        self.rule_type = rule_type.into();
        self.category = category.into();
        self
    }

    pub fn with_parameter(mut self, parameter: RuleParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_rule = true;
        self
    }

    /// Look up a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&RuleParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// True when `other` differs from this rule in anything but status
    pub fn differs_beyond_status(&self, other: &AmlRule) -> bool {
        let mut normalized = other.clone();
        normalized.status = self.status;
        normalized.version = self.version;
        &normalized != self
    }
}
