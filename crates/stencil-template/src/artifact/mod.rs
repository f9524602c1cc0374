/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The artifact language: what the transpiler emits and the runtime executes.
//!
//! An artifact is UTF-8 text. Its first line is the format header, which
//! names the artifact format version and the engine that produced it. The
//! rest is literal text interleaved with `<?tpl ... ?>` code blocks.
//!
//! The header doubles as the runtime capability check: an artifact whose
//! header is not exactly [`header()`] is refused before any of it runs, and
//! the cache treats it as stale.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::Program;

use crate::error::{TemplateError, TemplateResult};
use std::fmt;
use std::path::Path;

/// Version of the artifact format. Bump when the generated code changes shape.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Prefix shared by every artifact header.
pub const HEADER_PREFIX: &str = "#!stencil-artifact";

/// Message reported when an artifact was not produced for this runtime.
pub const GUARD_MESSAGE: &str = "Render Error: artifact was not produced for this runtime";

/// The header line (without newline) for artifacts produced by this build.
pub fn header() -> String {
    format!(
        "{HEADER_PREFIX} v{ARTIFACT_FORMAT_VERSION} {}",
        stencil_util::engine_stamp()
    )
}

/// Whether `first_line` is the header this runtime expects.
pub fn is_current_header(first_line: &str) -> bool {
    first_line.trim_end_matches('\r') == header()
}

/// Split an artifact into its header check and body.
///
/// Fails with [`GUARD_MESSAGE`] when the header is missing or foreign.
pub fn check_header<'a>(artifact: &'a str, path: &Path) -> TemplateResult<&'a str> {
    let (first, body) = artifact.split_once('\n').unwrap_or((artifact, ""));
    if is_current_header(first) {
        Ok(body)
    } else {
        tracing::warn!(path = %path.display(), header = first, "refusing foreign artifact");
        Err(TemplateError::render_failure(path, GUARD_MESSAGE))
    }
}

/// Check the header and parse the body of an artifact read from `path`.
pub fn load_program(artifact: &str, path: &Path) -> TemplateResult<Program> {
    let body = check_header(artifact, path)?;
    parser::parse_program(body).map_err(|e| {
        TemplateError::compile_failure(path, format!("invalid generated code: {e}"))
    })
}

/// Parse freshly generated code before it is cached, so that a template
/// which transpiles to unbalanced code fails against its own `source` path.
pub fn validate_generated(code: &str, source: &Path) -> TemplateResult<()> {
    load_program(code, source).map(drop)
}

/// A lexing or parsing error in generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based line within the artifact body.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for SyntaxError {}
