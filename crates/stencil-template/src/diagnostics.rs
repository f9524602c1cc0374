/*
 * diagnostics.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile-time diagnostics.
//!
//! The transpiler never fails on a directive it does not understand; it
//! drops it and records a warning here instead, so callers can surface
//! authoring mistakes without breaking the compile. Anything worse than a
//! warning is a [`TemplateError`](crate::TemplateError).

use std::fmt;

/// A warning, optionally tagged with a stable code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "warning[{code}]: {}", self.message),
            None => write!(f, "warning: {}", self.message),
        }
    }
}

/// Collector for diagnostic messages produced while transpiling.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning message with its code.
    pub fn warn_with_code(&mut self, code: &str, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(message).with_code(code));
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collector_keeps_order() {
        let mut collector = DiagnosticCollector::new();
        collector.warn_with_code("unmatched-directive", "dropped {foo bar}");
        collector.warn_with_code("unmatched-directive", "dropped {baz}");

        let messages: Vec<String> = collector
            .into_diagnostics()
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(messages, vec!["dropped {foo bar}", "dropped {baz}"]);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::warning("dropped").with_code("unmatched-directive");
        assert_eq!(d.to_string(), "warning[unmatched-directive]: dropped");
        assert_eq!(Diagnostic::warning("dropped").to_string(), "warning: dropped");
    }
}
