/*
 * compile.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile command implementation
 */

use anyhow::{Context, Result};
use tracing::info;

use super::EngineArgs;

/// Execute the compile command
pub fn execute(engine_args: &EngineArgs, name: &str) -> Result<()> {
    let engine = engine_args.engine()?;
    let artifact = engine
        .compile(name)
        .with_context(|| format!("Failed to compile '{name}'"))?;

    if artifact.recompiled {
        info!(artifact = %artifact.generated_path.display(), "compiled");
    } else {
        info!(artifact = %artifact.generated_path.display(), "up to date");
    }
    println!("{}", artifact.generated_path.display());
    Ok(())
}
