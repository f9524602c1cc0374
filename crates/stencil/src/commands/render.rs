/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! Renders a view with data read from a JSON file. The data file must hold a
//! single object; its keys become template variables.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use stencil_template::{RenderContext, RenderOptions, TemplateError};

use super::EngineArgs;

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    /// Logical view name
    pub name: String,
    /// JSON data file
    pub data: Option<PathBuf>,
    /// Layout wrapping the view
    pub layout: Option<String>,
    /// Partial-page request flag
    pub pjax: bool,
    /// Output file path
    pub output: Option<PathBuf>,
}

/// Execute the render command
pub fn execute(engine_args: &EngineArgs, args: RenderArgs) -> Result<()> {
    let engine = engine_args.engine()?;
    let data = match &args.data {
        Some(path) => load_data(path)?,
        None => RenderContext::new(),
    };
    debug!(variables = data.len(), "render data loaded");

    let mut options = RenderOptions::default().with_pjax(args.pjax);
    options.layout = args.layout.clone();

    let output = match engine.render(&args.name, data, &options) {
        Ok(output) => output,
        // A template that stops early still answers with its output.
        Err(TemplateError::EarlyExit { output }) => {
            info!("rendering stopped early");
            output
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to render '{}'", args.name));
        }
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(output = %path.display(), "rendered");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn load_data(path: &Path) -> Result<RenderContext> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse data file {}", path.display()))?;
    RenderContext::from_json(json)
        .with_context(|| format!("Data file {} must contain a JSON object", path.display()))
}
