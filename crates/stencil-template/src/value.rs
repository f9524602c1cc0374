/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Runtime values.
//!
//! Templates are written against loosely typed data: numbers compare equal to
//! numeric strings, empty collections are falsy, and everything can be echoed.
//! [`Value`] captures those rules in one place so the runtime, the built-in
//! functions and host functions agree on them.

use indexmap::IndexMap;
use std::cmp::Ordering;

/// A value that can be bound in a render context or produced by an expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// A null/missing value.
    #[default]
    Null,

    /// A boolean value.
    Bool(bool),

    /// An integer value.
    Int(i64),

    /// A floating point value.
    Float(f64),

    /// A string value.
    String(String),

    /// A list of values, indexed from zero.
    List(Vec<Value>),

    /// An ordered map of string keys to values.
    Map(IndexMap<String, Value>),
}

/// A value coerced to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl Value {
    /// Name of the value's type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) | Value::Map(_) => "array",
        }
    }

    /// Check if this value is "truthy" for conditional evaluation.
    ///
    /// Falsy values are `null`, `false`, `0`, `0.0`, the empty string, the
    /// string `"0"` and empty collections. Everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !(s.is_empty() || s == "0"),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Render this value as a string for output.
    ///
    /// - Null and `false`: ""
    /// - `true`: "1"
    /// - Floats without a fractional part print like integers
    /// - Collections: "Array"
    pub fn to_output_string(&self) -> String {
        match self {
            Value::Null | Value::Bool(false) => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => "Array".to_string(),
        }
    }

    /// The string used when this value is a map key.
    pub fn to_key(&self) -> String {
        match self {
            Value::Float(f) => (f.trunc() as i64).to_string(),
            other => other.to_output_string(),
        }
    }

    /// Coerce to a number if the value has a numeric reading.
    ///
    /// Non-numeric strings and collections have none.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Null => Some(Number::Int(0)),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::String(s) => parse_numeric(s),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Number of elements for collections.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a list index or map key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::List(items) => match key.as_number()? {
                Number::Int(i) => usize::try_from(i).ok().and_then(|i| items.get(i)),
                Number::Float(_) => None,
            },
            Value::Map(m) => m.get(&key.to_key()),
            _ => None,
        }
    }

    /// Loose equality (`==`): numbers compare with numeric strings, booleans
    /// and null compare by truthiness.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), b) | (b, Value::Bool(a)) => *a == b.is_truthy(),
            (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
            (Value::Null, v) | (v, Value::Null) => !v.is_truthy(),
            (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
                (Some(x), Some(y)) => x.compare(y) == Some(Ordering::Equal),
                _ => a == b,
            },
            (Value::Int(_) | Value::Float(_), Value::String(s))
            | (Value::String(s), Value::Int(_) | Value::Float(_)) => {
                let number = if let Value::String(_) = self { other } else { self };
                match (number.as_number(), parse_numeric(s)) {
                    (Some(x), Some(y)) => x.compare(y) == Some(Ordering::Equal),
                    _ => number.to_output_string() == *s,
                }
            }
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                match (self.as_number(), other.as_number()) {
                    (Some(x), Some(y)) => x.compare(y) == Some(Ordering::Equal),
                    _ => false,
                }
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            (Value::List(a), Value::Map(b)) | (Value::Map(b), Value::List(a)) => {
                a.is_empty() && b.is_empty()
            }
            _ => false,
        }
    }

    /// Loose ordering used by `<`, `<=`, `>` and `>=`.
    ///
    /// Returns `None` for incomparable values (e.g. NaN).
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(_) | Value::Null, _) | (_, Value::Bool(_) | Value::Null) => {
                if let (Value::Null, Value::String(s)) = (self, other) {
                    return Some(String::new().cmp(s));
                }
                if let (Value::String(s), Value::Null) = (self, other) {
                    return Some(s.as_str().cmp(""));
                }
                Some(self.is_truthy().cmp(&other.is_truthy()))
            }
            (Value::List(_) | Value::Map(_), Value::List(_) | Value::Map(_)) => {
                self.len().partial_cmp(&other.len())
            }
            (Value::List(_) | Value::Map(_), _) => Some(Ordering::Greater),
            (_, Value::List(_) | Value::Map(_)) => Some(Ordering::Less),
            (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
                (Some(x), Some(y)) => x.compare(y),
                _ => Some(a.cmp(b)),
            },
            _ => match (self.as_number(), other.as_number()) {
                (Some(x), Some(y)) => x.compare(y),
                _ => Some(self.to_output_string().cmp(&other.to_output_string())),
            },
        }
    }

    /// Convert a JSON value, keeping object key order.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Parse a numeric string: optional surrounding whitespace, an integer or a
/// decimal/exponent float. Words like `inf` or `nan` are not numeric.
pub fn parse_numeric(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    let first = trimmed.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '+' | '-' | '.')) {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::Int(i));
    }
    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().map(Number::Float)
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { "INF" } else { "-INF" }).to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}
