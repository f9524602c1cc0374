/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template resolution, compilation and rendering.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Resolution exhausted every candidate path.
    #[error("Template not found: '{name}' (tried: {})", format_attempts(.attempted))]
    TemplateNotFound {
        name: String,
        attempted: Vec<PathBuf>,
    },

    /// The content template and its layout are the same template.
    #[error("Layout can't be the same as the view file: {}", .path.display())]
    LayoutConflict { path: PathBuf },

    /// Generating or writing an artifact failed.
    #[error("Compile error in {}: {message}", .path.display())]
    CompileFailure {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A compiled artifact failed while executing.
    #[error("Render error in {}: {message}", .path.display())]
    RenderFailure { path: PathBuf, message: String },

    /// Include nesting exceeded the configured depth.
    #[error("Recursive include detected (depth > {max_depth}): {name}")]
    RecursiveInclude { name: String, max_depth: usize },

    /// A template function asked to stop rendering and answer with `output`.
    ///
    /// This is a control signal, not a failure: callers must pass it through
    /// untouched instead of wrapping it.
    #[error("Rendering stopped early")]
    EarlyExit { output: String },

    /// Invalid engine configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl TemplateError {
    pub fn compile_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TemplateError::CompileFailure {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an I/O error raised while producing the artifact for `path`.
    pub fn compile_io(path: &Path, action: &str, err: std::io::Error) -> Self {
        TemplateError::CompileFailure {
            path: path.to_path_buf(),
            message: format!("{action}: {err}"),
            source: Some(err),
        }
    }

    pub fn render_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TemplateError::RenderFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        TemplateError::Config {
            message: message.into(),
        }
    }
}

fn format_attempts(attempted: &[PathBuf]) -> String {
    attempted
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_attempts() {
        let err = TemplateError::TemplateNotFound {
            name: "index".to_string(),
            attempted: vec![PathBuf::from("/a/index.tpl"), PathBuf::from("/b/index.tpl")],
        };
        assert_eq!(
            err.to_string(),
            "Template not found: 'index' (tried: /a/index.tpl, /b/index.tpl)"
        );
    }
}
