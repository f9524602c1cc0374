/*
 * resolve.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Resolve command implementation
 */

use anyhow::{Context, Result};
use stencil_template::RouteContext;

use super::EngineArgs;

/// Arguments for the resolve command
#[derive(Debug)]
pub struct ResolveArgs {
    pub name: String,
    pub module: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
}

impl ResolveArgs {
    /// A route is used as soon as any of its parts is given.
    fn route(&self) -> Option<RouteContext> {
        if self.module.is_none() && self.controller.is_none() && self.action.is_none() {
            return None;
        }
        Some(RouteContext::new(
            self.module.clone().unwrap_or_default(),
            self.controller.clone().unwrap_or_default(),
            self.action.clone().unwrap_or_default(),
        ))
    }
}

/// Execute the resolve command
pub fn execute(engine_args: &EngineArgs, args: ResolveArgs) -> Result<()> {
    let engine = engine_args.engine()?;
    let route = args.route();
    let path = engine
        .resolve(&args.name, route.as_ref())
        .with_context(|| format!("Cannot resolve view '{}'", args.name))?;
    println!("{}", path.display());
    Ok(())
}
