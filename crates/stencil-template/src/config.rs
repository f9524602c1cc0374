/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration.
//!
//! All paths and knobs live in one [`EngineConfig`] passed to
//! [`Engine::new`](crate::Engine::new); nothing is process-global. The config
//! can be deserialized from YAML:
//!
//! ```yaml
//! template-dir: app/view
//! cache-dir: runtime/view
//! delimiters:
//!   left: "{"
//!   right: "}"
//! strict-variables: false
//! debug: false
//! version: "1.4.2"
//! ```

use crate::error::{TemplateError, TemplateResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default depth limit for nested includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 50;

/// Left/right directive delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: "{".to_string(),
            right: "}".to_string(),
        }
    }
}

impl Delimiters {
    /// Create a delimiter pair, rejecting empty, identical or unusable delimiters.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> TemplateResult<Self> {
        let delimiters = Self {
            left: left.into(),
            right: right.into(),
        };
        delimiters.validate()?;
        Ok(delimiters)
    }

    pub fn validate(&self) -> TemplateResult<()> {
        if self.left.is_empty() || self.right.is_empty() {
            return Err(TemplateError::config("delimiters must not be empty"));
        }
        if self.left == self.right {
            return Err(TemplateError::config(format!(
                "left and right delimiters must differ (both are '{}')",
                self.left
            )));
        }
        for delimiter in [&self.left, &self.right] {
            if clashes_with_generated_code(delimiter) {
                return Err(TemplateError::config(format!(
                    "delimiter '{delimiter}' overlaps the generated code syntax"
                )));
            }
        }
        Ok(())
    }
}

/// Generated code is built from calls, quoted keys, `$` variables and
/// `<?tpl ... ?>` blocks. A delimiter matching any of that would be re-read
/// by the rewrite rules on their next pass.
fn clashes_with_generated_code(delimiter: &str) -> bool {
    const RESERVED: &[char] = &['(', ')', '\'', '"', '$', ';', '?'];
    const BRACKETS: &[char] = &['[', ']', '<', '>'];

    delimiter.contains(RESERVED) || delimiter.chars().all(|c| BRACKETS.contains(&c))
}

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Root of the template source tree.
    pub template_dir: PathBuf,

    /// Directory receiving compiled artifacts.
    pub cache_dir: PathBuf,

    /// Directive delimiters used to build every rewrite rule.
    pub delimiters: Delimiters,

    /// File extension of compiled artifacts.
    pub artifact_extension: String,

    /// Treat undefined variables and missing keys as render failures.
    pub strict_variables: bool,

    /// Debug mode: exposed to templates as `__debug`, and `__v` becomes a
    /// timestamp so assets are never served stale.
    pub debug: bool,

    /// Application version exposed to templates as `__v` outside debug mode.
    pub version: Option<String>,

    /// Maximum include nesting depth.
    pub max_include_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("app/view"),
            cache_dir: PathBuf::from("runtime/view"),
            delimiters: Delimiters::default(),
            artifact_extension: "stc".to_string(),
            strict_variables: false,
            debug: false,
            version: None,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Config with the given template and cache directories and defaults elsewhere.
    pub fn new(template_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse a YAML config document.
    pub fn from_yaml_str(source: &str) -> TemplateResult<Self> {
        let config: Self = serde_yaml::from_str(source)
            .map_err(|e| TemplateError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file. Relative directories are taken relative to
    /// the file's directory.
    pub fn from_yaml_file(path: &Path) -> TemplateResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            TemplateError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_yaml_str(&source)?;
        if let Some(base) = path.parent() {
            if config.template_dir.is_relative() {
                config.template_dir = base.join(&config.template_dir);
            }
            if config.cache_dir.is_relative() {
                config.cache_dir = base.join(&config.cache_dir);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> TemplateResult<()> {
        self.delimiters.validate()?;
        if self.artifact_extension.is_empty() || self.artifact_extension.contains(['/', '\\']) {
            return Err(TemplateError::config(format!(
                "invalid artifact extension '{}'",
                self.artifact_extension
            )));
        }
        if self.max_include_depth == 0 {
            return Err(TemplateError::config("max-include-depth must be at least 1"));
        }
        Ok(())
    }
}
