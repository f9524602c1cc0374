/*
 * transpile.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Transpile command implementation
 */

use anyhow::{Context, Result};
use std::path::Path;

use super::EngineArgs;

/// Execute the transpile command
///
/// Generated code goes to stdout and diagnostics to stderr, so the output
/// can be piped into a file.
pub fn execute(engine_args: &EngineArgs, file: &Path) -> Result<()> {
    let engine = engine_args.engine()?;
    let transpiled = engine
        .transpile_file(file)
        .with_context(|| format!("Failed to transpile {}", file.display()))?;

    for diagnostic in &transpiled.diagnostics {
        eprintln!("{}: {diagnostic}", file.display());
    }
    print!("{}", transpiled.code);
    Ok(())
}
