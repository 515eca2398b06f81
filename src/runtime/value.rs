// src/runtime/value.rs
//! Tagged value type used for rule parameters, condition operands and
//! subject fields.
//!
//! Human-readable formats (JSON) see plain values (`10000`, `"US"`,
//! `[1, 2]`); binary formats (bincode snapshots) see a tagged encoding so
//! dates survive the round trip.

use crate::EvalError;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Closed set of value kinds a rule can compare
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Date(DateTime<Utc>),
    List(Vec<Value>),
}

/// Result of ordering two values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    Incomparable,
}

impl From<Option<Ordering>> for Comparison {
    fn from(ordering: Option<Ordering>) -> Self {
        match ordering {
            Some(Ordering::Less) => Comparison::Less,
            Some(Ordering::Equal) => Comparison::Equal,
            Some(Ordering::Greater) => Comparison::Greater,
            None => Comparison::Incomparable,
        }
    }
}

impl Value {
    /// Order two values.
    ///
    /// Numbers and dates compare numerically, text lexicographically.
    /// Every other pairing is `Incomparable`.
    pub fn compare(&self, other: &Value) -> Comparison {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).into(),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)).into(),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)).into(),
            _ => Comparison::Incomparable,
        }
    }

    /// Membership test: list element equality or substring match.
    pub fn contains(&self, item: &Value) -> Result<bool, EvalError> {
        match (self, item) {
            (Value::List(items), _) => Ok(items.contains(item)),
            (Value::Text(haystack), Value::Text(needle)) => Ok(haystack.contains(needle.as_str())),
            (Value::Text(_), other) => Err(EvalError::TypeMismatch(format!(
                "cannot search text for {}",
                other.kind()
            ))),
            (other, _) => Err(EvalError::TypeMismatch(format!(
                "{} is not a container",
                other.kind()
            ))),
        }
    }

    /// Name of the value kind, as used in rule definitions
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::List(_) => "list",
        }
    }

    /// Check if value is a scalar (not a list)
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Read a text value as a date, if it holds an RFC 3339 timestamp or a
    /// plain `YYYY-MM-DD` day (midnight UTC).
    pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    /// Return this value read as a date when `like` is a date and this is
    /// date-shaped text. Anything else is returned unchanged.
    pub fn align_to(self, like: &Value) -> Value {
        match (&self, like) {
            (Value::Text(text), Value::Date(_)) => match Value::parse_date(text) {
                Some(date) => Value::Date(date),
                None => self,
            },
            _ => self,
        }
    }

    /// Convert a JSON value. `null` yields `None`; objects (and lists that
    /// hold them) are rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Option<Value>, EvalError> {
        match json {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Bool(b) => Ok(Some(Value::Bool(*b))),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(|f| Some(Value::Number(f)))
                .ok_or_else(|| EvalError::TypeMismatch(format!("number {} out of range", n))),
            serde_json::Value::String(s) => Ok(Some(Value::Text(s.clone()))),
            serde_json::Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match Value::from_json(item)? {
                        Some(value) => values.push(value),
                        None => {
                            return Err(EvalError::TypeMismatch(
                                "list contains null".to_string(),
                            ))
                        }
                    }
                }
                Ok(Some(Value::List(values)))
            }
            serde_json::Value::Object(_) => Err(EvalError::TypeMismatch(
                "objects are not comparable values".to_string(),
            )),
        }
    }

    /// Convert to JSON; dates become RFC 3339 strings
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, val) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Binary encoding. Borrowed on the way out, owned on the way in.
#[derive(Serialize)]
enum TaggedRef<'a> {
    Number(f64),
    Text(&'a str),
    Bool(bool),
    Date(&'a DateTime<Utc>),
    List(&'a [Value]),
}

#[derive(Deserialize)]
enum Tagged {
    Number(f64),
    Text(String),
    Bool(bool),
    Date(DateTime<Utc>),
    List(Vec<Value>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            return self.to_json().serialize(serializer);
        }
        let tagged = match self {
            Value::Number(n) => TaggedRef::Number(*n),
            Value::Text(s) => TaggedRef::Text(s),
            Value::Bool(b) => TaggedRef::Bool(*b),
            Value::Date(d) => TaggedRef::Date(d),
            Value::List(items) => TaggedRef::List(items),
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let json = serde_json::Value::deserialize(deserializer)?;
            return match Value::from_json(&json) {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(serde::de::Error::custom("null is not a rule value")),
                Err(e) => Err(serde::de::Error::custom(e)),
            };
        }
        Ok(match Tagged::deserialize(deserializer)? {
            Tagged::Number(n) => Value::Number(n),
            Tagged::Text(s) => Value::Text(s),
            Tagged::Bool(b) => Value::Bool(b),
            Tagged::Date(d) => Value::Date(d),
            Tagged::List(items) => Value::List(items),
        })
    }
}

// Convenient conversions
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}
