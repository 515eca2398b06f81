// src/compiler/compiler.rs
//! Compiler that validates rule definitions and lowers them into
//! [`CompiledRule`]s

use crate::compiler::program::{
    CompiledCondition, CompiledRule, Operand, ParameterTable, Pattern,
};
use crate::model::{AmlRule, ConditionOperator, DataType, RuleCondition, RuleParameter, ValueType};
use crate::{Comparison, EngineConfig, RuleError, Value};
use ahash::HashSet;
use regex::{Regex, RegexBuilder};

pub struct Compiler<'a> {
    config: &'a EngineConfig,
    issues: Vec<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            issues: Vec::new(),
        }
    }

    /// Lower a rule. Never fails: problems that validation would reject are
    /// carried into the compiled form and surface as condition errors.
    pub fn compile_rule(&self, rule: &AmlRule) -> CompiledRule {
        let parameters: ParameterTable = rule
            .parameters
            .iter()
            .map(|p| {
                let value = typed_value(p).unwrap_or_else(|_| p.value.clone());
                (p.name.clone(), value)
            })
            .collect();

        let conditions = rule
            .conditions
            .iter()
            .map(|c| self.compile_condition(c, &parameters))
            .collect();

        CompiledRule {
            id: rule.id.clone(),
            status: rule.status,
            severity: rule.severity,
            version: rule.version,
            parameters,
            conditions,
            regex_size_limit: self.config.regex_size_limit,
        }
    }

    fn compile_condition(&self, condition: &RuleCondition, parameters: &ParameterTable) -> CompiledCondition {
        let operand = match condition.value_type {
            ValueType::Static => Operand::Literal(condition.value.clone()),
            ValueType::Parameter => Operand::Parameter(reference_name(&condition.value)),
            ValueType::Dynamic => Operand::Dynamic(reference_name(&condition.value)),
        };

        let pattern = if condition.operator == ConditionOperator::Regex {
            let known = match &operand {
                Operand::Literal(v) => Some(v),
                Operand::Parameter(name) => parameters.get(name),
                Operand::Dynamic(_) => None,
            };
            known.map(|v| match v {
                Value::Text(source) => match build_regex(source, self.config.regex_size_limit) {
                    Ok(re) => Pattern::Compiled(re),
                    Err(e) => Pattern::Invalid(e),
                },
                other => Pattern::Invalid(format!("regex operand must be a string, got {}", other.kind())),
            })
        } else {
            None
        };

        CompiledCondition {
            id: condition.id.clone(),
            field: condition.field.clone(),
            operator: condition.operator,
            operand,
            logic: condition.logic(),
            pattern,
        }
    }

    /// Check every invariant a stored rule must hold. All problems are
    /// reported together.
    pub fn validate(mut self, rule: &AmlRule) -> Result<(), RuleError> {
        if rule.id.trim().is_empty() {
            self.issue("rule id must not be empty");
        }
        if rule.name.trim().is_empty() {
            self.issue("name must not be empty");
        }
        if rule.description.trim().is_empty() {
            self.issue("description must not be empty");
        }

        let mut table = ParameterTable::default();
        let mut names = HashSet::default();
        for param in &rule.parameters {
            if !names.insert(param.name.as_str()) {
                self.issue(format!("duplicate parameter `{}`", param.name));
            }
            match typed_value(param) {
                Ok(value) => {
                    self.check_parameter_constraints(param, &value);
                    table.insert(param.name.clone(), value);
                }
                Err(e) => self.issue(format!("parameter `{}`: {}", param.name, e)),
            }
        }

        let mut ids = HashSet::default();
        for condition in &rule.conditions {
            if !ids.insert(condition.id.as_str()) {
                self.issue(format!("duplicate condition id `{}`", condition.id));
            }
            self.check_condition(condition, rule, &table);
        }

        let mut action_ids = HashSet::default();
        for action in &rule.actions {
            if !action_ids.insert(action.id.as_str()) {
                self.issue(format!("duplicate action id `{}`", action.id));
            }
        }

        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(RuleError::ValidationFailed {
                rule_id: rule.id.clone(),
                issues: self.issues,
            })
        }
    }

    fn check_parameter_constraints(&mut self, param: &RuleParameter, value: &Value) {
        let elements: Vec<&Value> = match value {
            Value::List(items) => items.iter().collect(),
            scalar => vec![scalar],
        };

        for element in &elements {
            if let Some(n) = element.as_number() {
                if param.min_value.map_or(false, |min| n < min) {
                    self.issue(format!("parameter `{}`: {} is below minValue", param.name, n));
                }
                if param.max_value.map_or(false, |max| n > max) {
                    self.issue(format!("parameter `{}`: {} is above maxValue", param.name, n));
                }
            }
        }

        if let Some(options) = &param.options {
            for element in elements {
                if !options.contains(element) {
                    self.issue(format!(
                        "parameter `{}`: {} is not one of the allowed options",
                        param.name, element
                    ));
                }
            }
        }
    }

    fn check_condition(&mut self, condition: &RuleCondition, rule: &AmlRule, table: &ParameterTable) {
        let label = format!("condition `{}`", condition.id);

        if condition.field.trim().is_empty() {
            self.issue(format!("{}: field must not be empty", label));
        }

        let operand = match condition.value_type {
            ValueType::Static => Some(condition.value.clone()),
            ValueType::Parameter => {
                let name = reference_name(&condition.value);
                if rule.parameter(&name).is_none() {
                    self.issue(format!("{}: unknown parameter `{}`", label, name));
                }
                table.get(&name).cloned()
            }
            ValueType::Dynamic => {
                if !matches!(condition.value, Value::Text(ref s) if !s.is_empty()) {
                    self.issue(format!("{}: dynamic operand must name a value", label));
                }
                None
            }
        };

        if let Some(operand) = operand {
            if let Err(e) = check_operand(condition.operator, &operand, self.config.regex_size_limit) {
                self.issue(format!("{}: {}", label, e));
            }
        }
    }

    fn issue(&mut self, message: impl Into<String>) {
        self.issues.push(message.into());
    }
}

/// Name held by a `parameter` or `dynamic` operand
fn reference_name(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parameter value converted to its declared type
pub fn typed_value(param: &RuleParameter) -> Result<Value, String> {
    let value = &param.value;
    match (param.data_type, value) {
        (DataType::Number, Value::Number(_))
        | (DataType::String, Value::Text(_))
        | (DataType::Boolean, Value::Bool(_))
        | (DataType::Date, Value::Date(_)) => Ok(value.clone()),
        (DataType::Date, Value::Text(text)) => Value::parse_date(text)
            .map(Value::Date)
            .ok_or_else(|| format!("`{}` is not a date", text)),
        (DataType::List, Value::List(items)) => {
            let mut kind = None;
            for item in items {
                if !item.is_scalar() {
                    return Err("list parameters hold scalars only".to_string());
                }
                match kind {
                    None => kind = Some(item.kind()),
                    Some(k) if k != item.kind() => {
                        return Err(format!("list mixes {} and {} values", k, item.kind()))
                    }
                    Some(_) => {}
                }
            }
            Ok(value.clone())
        }
        (declared, actual) => Err(format!(
            "declared {:?} but value is {}",
            declared,
            actual.kind()
        )),
    }
}

/// Check that an operand fits an operator
pub fn check_operand(operator: ConditionOperator, operand: &Value, regex_size_limit: usize) -> Result<(), String> {
    match operator {
        ConditionOperator::Eq | ConditionOperator::Ne => Ok(()),
        ConditionOperator::Gt | ConditionOperator::Lt | ConditionOperator::Gte | ConditionOperator::Lte => {
            match operand {
                Value::Number(_) | Value::Text(_) | Value::Date(_) => Ok(()),
                other => Err(format!("`{}` cannot order a {} operand", operator, other.kind())),
            }
        }
        ConditionOperator::Contains | ConditionOperator::NotContains => {
            if operand.is_scalar() {
                Ok(())
            } else {
                Err(format!("`{}` needs a single item to look for", operator))
            }
        }
        ConditionOperator::In | ConditionOperator::NotIn => match operand {
            Value::List(_) => Ok(()),
            other => Err(format!("`{}` needs a list operand, got {}", operator, other.kind())),
        },
        ConditionOperator::Between => match operand {
            Value::List(bounds) if bounds.len() == 2 => match bounds[0].compare(&bounds[1]) {
                Comparison::Less | Comparison::Equal => Ok(()),
                Comparison::Greater => Err("`between` lower bound exceeds upper bound".to_string()),
                Comparison::Incomparable => Err("`between` bounds are not comparable".to_string()),
            },
            Value::List(bounds) => Err(format!(
                "`between` needs exactly two bounds, got {}",
                bounds.len()
            )),
            other => Err(format!("`between` needs a [low, high] list, got {}", other.kind())),
        },
        ConditionOperator::Regex => match operand {
            Value::Text(source) => build_regex(source, regex_size_limit).map(|_| ()),
            other => Err(format!("`regex` needs a string pattern, got {}", other.kind())),
        },
    }
}

pub fn build_regex(source: &str, size_limit: usize) -> Result<Regex, String> {
    RegexBuilder::new(source)
        .size_limit(size_limit)
        .build()
        .map_err(|e| e.to_string())
}
