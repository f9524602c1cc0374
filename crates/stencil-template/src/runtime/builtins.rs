/*
 * builtins.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Function registry and built-in template functions.
//!
//! Every function, built-in or registered by the host, has the same shape:
//! it receives evaluated arguments and returns a [`Value`]. Function-style
//! directives (`{name key=val}`) reach host functions with one map argument.
//!
//! `empty` and `isset` are not here: they inspect unevaluated expressions
//! and are handled by the interpreter.

use crate::value::{Number, Value, parse_numeric};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure signalled by a template function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    /// The call failed; rendering fails with this message.
    #[error("{0}")]
    Failed(String),

    /// Stop rendering and answer with this output instead.
    #[error("early exit")]
    Exit(String),
}

impl FunctionError {
    pub fn failed(message: impl Into<String>) -> Self {
        FunctionError::Failed(message.into())
    }
}

/// A callable template function.
pub type TemplateFunction = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// Functions callable from templates, keyed by lowercase name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, TemplateFunction>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("strval", |a| Ok(Value::String(arg(a, 0).to_output_string())));
        registry.register("intval", |a| Ok(Value::Int(to_int(arg(a, 0)))));
        registry.register("floatval", |a| Ok(Value::Float(to_float(arg(a, 0)))));
        registry.register("boolval", |a| Ok(Value::Bool(arg(a, 0).is_truthy())));
        registry.register("escape", |a| {
            Ok(Value::String(escape_html(&arg(a, 0).to_output_string())))
        });
        registry.register("count", count);
        registry.register("strlen", |a| {
            Ok(Value::Int(
                i64::try_from(arg(a, 0).to_output_string().len()).unwrap_or(i64::MAX),
            ))
        });
        registry.register("strtoupper", |a| {
            Ok(Value::String(arg(a, 0).to_output_string().to_uppercase()))
        });
        registry.register("strtolower", |a| {
            Ok(Value::String(arg(a, 0).to_output_string().to_lowercase()))
        });
        registry.register("ucfirst", |a| Ok(Value::String(ucfirst(&arg(a, 0).to_output_string()))));
        registry.register("trim", |a| {
            Ok(Value::String(arg(a, 0).to_output_string().trim().to_string()))
        });
        registry.register("implode", implode);
        registry.register("join", implode);
        registry.register("json_encode", |a| {
            serde_json::to_string(&arg(a, 0).to_json())
                .map(Value::String)
                .map_err(|e| FunctionError::failed(e.to_string()))
        });
        registry.register("in_array", in_array);
        registry.register("array_keys", array_keys);
        registry.register("nl2br", |a| Ok(Value::String(nl2br(&arg(a, 0).to_output_string()))));
        registry.register("is_array", |a| {
            Ok(Value::Bool(matches!(arg(a, 0), Value::List(_) | Value::Map(_))))
        });
        registry
    }

    /// Register (or replace) a function. Names are case-insensitive.
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.functions
            .insert(name.to_ascii_lowercase(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFunction> {
        self.functions.get(&name.to_ascii_lowercase())
    }
}

static NULL: Value = Value::Null;

/// The `i`th argument, or null when absent.
fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&NULL)
}

/// Number at the start of a string (`"12px"` reads as 12).
pub fn leading_number(s: &str) -> Option<Number> {
    if let Some(n) = parse_numeric(s) {
        return Some(n);
    }
    let trimmed = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in trimmed.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    parse_numeric(trimmed[..end].trim_end_matches('.'))
}

fn to_int(value: &Value) -> i64 {
    match value {
        Value::String(s) => match leading_number(s) {
            Some(Number::Int(i)) => i,
            Some(Number::Float(f)) => f as i64,
            None => 0,
        },
        Value::List(_) | Value::Map(_) => i64::from(value.is_truthy()),
        other => match other.as_number() {
            Some(Number::Int(i)) => i,
            Some(Number::Float(f)) => f as i64,
            None => 0,
        },
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::String(s) => leading_number(s).map_or(0.0, Number::as_f64),
        Value::List(_) | Value::Map(_) => f64::from(u8::from(value.is_truthy())),
        other => other.as_number().map_or(0.0, Number::as_f64),
    }
}

/// HTML special characters, including both quote styles.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn nl2br(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str("<br />\r\n");
            }
            '\n' | '\r' => {
                out.push_str("<br />");
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn count(args: &[Value]) -> Result<Value, FunctionError> {
    match arg(args, 0) {
        Value::Null => Ok(Value::Int(0)),
        value => match value.len() {
            Some(n) => Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX))),
            None => Err(FunctionError::failed(format!(
                "argument must be of type array, {} given",
                value.type_name()
            ))),
        },
    }
}

fn implode(args: &[Value]) -> Result<Value, FunctionError> {
    let (separator, pieces) = match (arg(args, 0), arg(args, 1)) {
        (pieces @ (Value::List(_) | Value::Map(_)), Value::Null) => (String::new(), pieces),
        (pieces @ (Value::List(_) | Value::Map(_)), sep) => (sep.to_output_string(), pieces),
        (sep, pieces @ (Value::List(_) | Value::Map(_))) => (sep.to_output_string(), pieces),
        _ => return Err(FunctionError::failed("argument must be of type array")),
    };
    let joined = values(pieces)
        .map(Value::to_output_string)
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::String(joined))
}

fn in_array(args: &[Value]) -> Result<Value, FunctionError> {
    let needle = arg(args, 0);
    let haystack = arg(args, 1);
    if haystack.len().is_none() {
        return Err(FunctionError::failed("argument #2 must be of type array"));
    }
    let strict = arg(args, 2).is_truthy();
    let found = values(haystack).any(|v| if strict { v == needle } else { v.loose_eq(needle) });
    Ok(Value::Bool(found))
}

fn array_keys(args: &[Value]) -> Result<Value, FunctionError> {
    match arg(args, 0) {
        Value::List(items) => Ok(Value::List(
            (0..items.len())
                .map(|i| Value::Int(i64::try_from(i).unwrap_or(i64::MAX)))
                .collect(),
        )),
        Value::Map(m) => Ok(Value::List(
            m.keys().map(|k| Value::String(k.clone())).collect(),
        )),
        other => Err(FunctionError::failed(format!(
            "argument must be of type array, {} given",
            other.type_name()
        ))),
    }
}

/// Element values of a collection; empty for scalars.
fn values(collection: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match collection {
        Value::List(items) => Box::new(items.iter()),
        Value::Map(m) => Box::new(m.values()),
        _ => Box::new(std::iter::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, FunctionError> {
        let registry = FunctionRegistry::with_builtins();
        let f = registry.get(name).unwrap();
        f(&args)
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            call("escape", vec![Value::from("<a href='x'>\"&\"</a>")]).unwrap(),
            Value::from("&lt;a href=&#039;x&#039;&gt;&quot;&amp;&quot;&lt;/a&gt;")
        );
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(call("intval", vec![Value::from("12px")]).unwrap(), Value::Int(12));
        assert_eq!(call("intval", vec![Value::Float(3.9)]).unwrap(), Value::Int(3));
        assert_eq!(call("intval", vec![Value::from("abc")]).unwrap(), Value::Int(0));
        assert_eq!(call("floatval", vec![Value::from("1.5em")]).unwrap(), Value::Float(1.5));
        assert_eq!(call("strval", vec![Value::Float(2.0)]).unwrap(), Value::from("2"));
    }

    #[test]
    fn test_count() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(call("count", vec![list]).unwrap(), Value::Int(2));
        assert_eq!(call("count", vec![Value::Null]).unwrap(), Value::Int(0));
        assert!(matches!(
            call("count", vec![Value::from("abc")]),
            Err(FunctionError::Failed(_))
        ));
    }

    #[test]
    fn test_strings() {
        assert_eq!(call("ucfirst", vec![Value::from("école")]).unwrap(), Value::from("École"));
        assert_eq!(call("strtoupper", vec![Value::from("ab")]).unwrap(), Value::from("AB"));
        assert_eq!(call("trim", vec![Value::from("  x \n")]).unwrap(), Value::from("x"));
        assert_eq!(call("strlen", vec![Value::from("héllo")]).unwrap(), Value::Int(6));
        assert_eq!(
            call("nl2br", vec![Value::from("a\nb\r\nc")]).unwrap(),
            Value::from("a<br />\nb<br />\r\nc")
        );
    }

    #[test]
    fn test_collections() {
        let list = Value::from(vec!["a", "b", "c"]);
        assert_eq!(
            call("implode", vec![Value::from(", "), list.clone()]).unwrap(),
            Value::from("a, b, c")
        );
        assert_eq!(call("join", vec![list.clone()]).unwrap(), Value::from("abc"));
        assert_eq!(
            call("in_array", vec![Value::from("b"), list.clone()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("in_array", vec![Value::Int(0), Value::from(vec!["0"]), Value::Bool(true)])
                .unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            call("array_keys", vec![list]).unwrap(),
            Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_json_encode_keeps_order() {
        let value = Value::from_json(serde_json::json!({"b": 1, "a": [true, null]}));
        assert_eq!(
            call("json_encode", vec![value]).unwrap(),
            Value::from(r#"{"b":1,"a":[true,null]}"#)
        );
    }

    #[test]
    fn test_registry_is_case_insensitive() {
        let mut registry = FunctionRegistry::new();
        registry.register("Greet", |_| Ok(Value::from("hi")));
        assert!(registry.get("greet").is_some());
        assert!(registry.get("GREET").is_some());
        assert!(registry.get("strval").is_none());
    }
}
