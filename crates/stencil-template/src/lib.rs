/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive-based view templating for stencil.
//!
//! Templates are plain text with `{...}` directives:
//!
//! - Echo: `{$name}` (HTML-escaped), `{$name nofilter}`, `{~ $html}`
//! - Access: `{$user.name}`, `{$user->name}`, `{$item@iteration}`
//! - Assignment and ternaries: `{$n = $n + 1}`, `{$ok ? 'yes' : 'no'}`
//! - Control flow: `{if}`/`{else if}`/`{else}`/`{/if}`, `{while}`,
//!   `{foreach $xs as $k => $x}`, `{break}`, `{continue}`
//! - Includes: `{include file=header}`
//! - Function calls: `{csrf}`, `{date('Y')}`, `{url path="/a" id=$id}`
//! - Comments: `{* ... *}`
//!
//! # Architecture
//!
//! A template is resolved to a source file ([`resolver`]), transpiled by an
//! ordered rule table into artifact code ([`transpiler`]), stored in an
//! on-disk cache keyed by source path ([`cache`]), then parsed
//! ([`artifact`]) and executed against a render context ([`runtime`]).
//! [`Engine`] ties these together.
//!
//! # Example
//!
//! ```ignore
//! use stencil_template::{Engine, EngineConfig, RenderContext, RenderOptions};
//!
//! let engine = Engine::new(EngineConfig::new("app/view", "runtime/view"))?;
//! let data = RenderContext::new().with("name", "World");
//! let html = engine.render("hello", data, &RenderOptions::default())?;
//! ```

pub mod artifact;
pub mod cache;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod runtime;
pub mod transpiler;
pub mod value;

// Re-export main types at crate root
pub use cache::{ArtifactCache, CompiledArtifact};
pub use config::{Delimiters, EngineConfig};
pub use context::RenderContext;
pub use diagnostics::{Diagnostic, DiagnosticCollector};
pub use engine::{CompileUnit, Engine, RenderOptions};
pub use error::{TemplateError, TemplateResult};
pub use resolver::{Resolver, RouteContext};
pub use runtime::builtins::{FunctionError, FunctionRegistry};
pub use transpiler::{Transpiled, Transpiler};
pub use value::Value;
