// src/runtime/context.rs
//! Evaluation context: the subject under screening plus any contextual
//! values the caller resolved ahead of time

use crate::{EvalError, Value};
use ahash::HashMap;

/// Immutable input for evaluating rules against one subject
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Identifier of the subject (transaction id, event id, ...)
    pub subject_id: String,

    /// Subject record, addressed by dot-paths
    pub subject: serde_json::Value,

    /// Pre-resolved values for `dynamic` conditions
    pub dynamics: HashMap<String, Value>,
}

impl EvaluationContext {
    pub fn new(subject_id: impl Into<String>, subject: serde_json::Value) -> Self {
        Self {
            subject_id: subject_id.into(),
            subject,
            dynamics: HashMap::default(),
        }
    }

    /// Build a context taking the subject id from a field of the record.
    /// Falls back to an empty id when the field is absent.
    pub fn from_record(subject: serde_json::Value, id_field: &str) -> Self {
        let subject_id = match lookup_path(&subject, id_field) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Self::new(subject_id, subject)
    }

    /// Supply a contextual value (e.g. "account_average")
    pub fn with_dynamic(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.dynamics.insert(name.into(), value.into());
        self
    }

    /// Resolve a dot-path in the subject to a comparable value
    pub fn field(&self, path: &str) -> Result<Value, EvalError> {
        let raw = lookup_path(&self.subject, path)
            .ok_or_else(|| EvalError::FieldNotFound(path.to_string()))?;
        Value::from_json(raw)?.ok_or_else(|| EvalError::FieldNotFound(path.to_string()))
    }

    /// Resolve a contextual value by name
    #[inline]
    pub fn dynamic(&self, name: &str) -> Result<Value, EvalError> {
        self.dynamics
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::DynamicValueNotFound(name.to_string()))
    }
}

/// Walk a dot-path. Object keys are matched literally; numeric segments
/// index into arrays.
pub fn lookup_path<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(root, |node, segment| match node {
        serde_json::Value::Object(map) => map.get(segment),
        serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
