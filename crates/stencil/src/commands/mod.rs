/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Command implementations for the stencil CLI
//!
//! Each command module handles the CLI interface and delegates to
//! stencil-template for the actual work.

pub mod compile;
pub mod render;
pub mod resolve;
pub mod transpile;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use stencil_template::{Delimiters, Engine, EngineConfig};

/// Engine settings shared by every command. Flags override the config file.
#[derive(Debug, Args)]
pub struct EngineArgs {
    /// YAML engine configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Template root directory
    #[arg(long, global = true)]
    pub template_dir: Option<PathBuf>,

    /// Directory for compiled artifacts
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Opening directive delimiter
    #[arg(long, global = true)]
    pub left_delimiter: Option<String>,

    /// Closing directive delimiter
    #[arg(long, global = true)]
    pub right_delimiter: Option<String>,

    /// Fail on undefined variables
    #[arg(long, global = true)]
    pub strict: bool,

    /// Debug mode (asset version is the current time)
    #[arg(long, global = true)]
    pub debug: bool,
}

impl EngineArgs {
    pub fn config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(dir) = &self.template_dir {
            config.template_dir = dir.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if self.left_delimiter.is_some() || self.right_delimiter.is_some() {
            let left = self
                .left_delimiter
                .clone()
                .unwrap_or_else(|| config.delimiters.left.clone());
            let right = self
                .right_delimiter
                .clone()
                .unwrap_or_else(|| config.delimiters.right.clone());
            config =
                config.with_delimiters(Delimiters::new(left, right).context("Invalid delimiters")?);
        }
        let strict = config.strict_variables || self.strict;
        let debug = config.debug || self.debug;
        Ok(config.with_strict_variables(strict).with_debug(debug))
    }

    pub fn engine(&self) -> Result<Engine> {
        let config = self.config()?;
        tracing::debug!(
            template_dir = %config.template_dir.display(),
            cache_dir = %config.cache_dir.display(),
            "engine configuration"
        );
        Engine::new(config).context("Failed to create template engine")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        engine: EngineArgs,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::parse_from([
            "stencil",
            "--template-dir",
            "views",
            "--left-delimiter",
            "<%",
            "--right-delimiter",
            "%>",
            "--strict",
        ]);
        let config = cli.engine.config().unwrap();
        assert_eq!(config.template_dir, PathBuf::from("views"));
        assert_eq!(config.cache_dir, PathBuf::from("runtime/view"));
        assert_eq!(config.delimiters.left, "<%");
        assert_eq!(config.delimiters.right, "%>");
        assert!(config.strict_variables);
        assert!(!config.debug);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stencil.yml");
        std::fs::write(&path, "template-dir: views\ncache-dir: cache\ndebug: true\n").unwrap();

        let cli = TestCli::parse_from([
            "stencil",
            "--config",
            path.to_str().unwrap(),
            "--cache-dir",
            "/tmp/elsewhere",
        ]);
        let config = cli.engine.config().unwrap();
        assert_eq!(config.template_dir, dir.path().join("views"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/elsewhere"));
        assert!(config.debug);
    }

    #[test]
    fn test_delimiter_overlapping_generated_code_rejected() {
        let cli = TestCli::parse_from([
            "stencil",
            "--left-delimiter",
            "(",
            "--right-delimiter",
            ")",
        ]);
        assert!(cli.engine.config().is_err());
    }

    #[test]
    fn test_equal_delimiters_rejected() {
        let cli = TestCli::parse_from(["stencil", "--left-delimiter", "}"]);
        assert!(cli.engine.config().is_err());
    }
}
