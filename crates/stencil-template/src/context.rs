/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render context: the variables a template sees.
//!
//! A [`RenderContext`] is an ordered mapping from variable name to [`Value`].
//! Callers build one from their data, the engine adds its own metadata
//! (template path, debug flags) and the runtime uses it as the initial scope.

use crate::value::Value;
use indexmap::IndexMap;

/// Name of the variable holding the content template path when a layout is bound.
pub const TEMPLATE_FILE_VAR: &str = "__template_file";

/// Flag set for partial-page (PJAX) requests.
pub const PJAX_VAR: &str = "__pjax";

/// Flag set when the engine runs in debug mode.
pub const DEBUG_VAR: &str = "__debug";

/// Asset version string (cache buster).
pub const VERSION_VAR: &str = "__v";

/// A context for template evaluation containing variable bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    variables: IndexMap<String, Value>,
}

impl RenderContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Anything else is rejected.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match Value::from_json(json) {
            Value::Map(variables) => Some(Self { variables }),
            _ => None,
        }
    }

    /// Insert a variable into the context, replacing any previous binding.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a variable from the context.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.variables.iter()
    }

    /// Consume the context, returning the variable map used as runtime scope.
    pub fn into_variables(self) -> IndexMap<String, Value> {
        self.variables
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RenderContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut ctx = RenderContext::new();
        ctx.insert("name", "Alice");
        ctx.insert("count", 3i64);

        assert_eq!(ctx.get("name"), Some(&Value::from("Alice")));
        assert_eq!(ctx.get("count"), Some(&Value::Int(3)));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn test_collect_keeps_order() {
        let ctx: RenderContext = [("title", "Home"), ("lang", "en")].into_iter().collect();
        let ctx = ctx.with("lang", "fr").with("extra", true);

        let keys: Vec<&str> = ctx.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["title", "lang", "extra"]);
        assert_eq!(ctx.get("lang"), Some(&Value::from("fr")));
    }

    #[test]
    fn test_from_json() {
        let ctx = RenderContext::from_json(serde_json::json!({"user": {"name": "Bob"}})).unwrap();
        let user = ctx.get("user").unwrap();
        assert_eq!(user.get(&Value::from("name")), Some(&Value::from("Bob")));

        assert!(RenderContext::from_json(serde_json::json!([1, 2])).is_none());
    }
}
