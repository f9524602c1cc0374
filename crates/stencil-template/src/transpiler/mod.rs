/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive transpiler.
//!
//! Turns template source into artifact text in two passes:
//!
//! 1. The ordered [`rules`] table. Each rule is applied repeatedly until it no
//!    longer matches, then the next rule runs.
//! 2. Function calls. Whatever `{name ...}` directive is left becomes a call:
//!    `{name}` calls with no arguments, `{name(args)}` passes the arguments
//!    through, and `{name k=v ...}` bundles the pairs into one map argument.
//!    A directive that fits none of these forms is dropped with an
//!    `unmatched-directive` warning.
//!
//! The transpiler is a pure function of the source text and the delimiter
//! pair; it never touches the cache.

pub mod rules;

use crate::artifact;
use crate::config::Delimiters;
use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use crate::error::{TemplateError, TemplateResult};
use regex::Regex;
use rules::{Rule, code, quote_bare_word, rule_table};
use std::path::Path;

/// Diagnostic code for directives that fit no rule.
pub const UNMATCHED_DIRECTIVE: &str = "unmatched-directive";

/// Upper bound on fixed-point iterations of a single rule. Each pass rewrites
/// every match, so only nesting (chained dotted access) needs more than one.
const MAX_RULE_PASSES: usize = 256;

/// Generated artifact text plus compile diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Transpiled {
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles directive templates into artifact text.
#[derive(Debug)]
pub struct Transpiler {
    delimiters: Delimiters,
    rules: Vec<Rule>,
    call: Regex,
    trailing_args: Regex,
    named_arg: Regex,
}

impl Transpiler {
    pub fn new(delimiters: &Delimiters) -> TemplateResult<Self> {
        delimiters.validate()?;
        let rules = rule_table(delimiters)
            .map_err(|e| TemplateError::config(format!("invalid rule pattern: {e}")))?;
        let call = Regex::new(&format!(
            r"{}(\w+)\s*(.*?){}",
            regex::escape(&delimiters.left),
            regex::escape(&delimiters.right)
        ))
        .map_err(|e| TemplateError::config(format!("invalid call pattern: {e}")))?;
        let trailing_args = Regex::new(r"\((.*)\)\s*$")
            .map_err(|e| TemplateError::config(e.to_string()))?;
        let named_arg = Regex::new(
            r#"\b([-\w]+?)\s*=\s*(\$[\w"'\]\[\-_>\$]+|"[^"\\]*(?:\\.[^"\\]*)*"|'[^'\\]*(?:\\.[^'\\]*)*'|([->\w]+))\s*?"#,
        )
        .map_err(|e| TemplateError::config(e.to_string()))?;

        Ok(Self {
            delimiters: delimiters.clone(),
            rules,
            call,
            trailing_args,
            named_arg,
        })
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Transpile template source that did not come from a file.
    pub fn transpile(&self, source: &str) -> TemplateResult<Transpiled> {
        self.transpile_source(source, Path::new("<inline>"))
    }

    /// Read and transpile a template file.
    pub fn transpile_file(&self, path: &Path) -> TemplateResult<Transpiled> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| TemplateError::compile_io(path, "cannot read template", e))?;
        self.transpile_source(&source, path)
    }

    /// Transpile `source`; `origin` only labels errors and diagnostics.
    pub fn transpile_source(&self, source: &str, origin: &Path) -> TemplateResult<Transpiled> {
        let structured = self.apply_rules(source, origin)?;

        let mut diagnostics = DiagnosticCollector::new();
        let body = self.compile_calls(&structured, &mut diagnostics);

        Ok(Transpiled {
            code: format!("{}\n{body}", artifact::header()),
            diagnostics: diagnostics.into_diagnostics(),
        })
    }

    /// Pass 1: every rule in order, each to a fixed point.
    fn apply_rules(&self, source: &str, origin: &Path) -> TemplateResult<String> {
        let mut text = source.to_string();
        for rule in &self.rules {
            let mut passes = 0;
            loop {
                let rewritten = rule.apply_once(&text).map_err(|e| {
                    TemplateError::compile_failure(origin, format!("rule '{}': {e}", rule.name))
                })?;
                let Some(rewritten) = rewritten else {
                    break;
                };
                text = rewritten;
                passes += 1;
                if passes >= MAX_RULE_PASSES {
                    return Err(TemplateError::compile_failure(
                        origin,
                        format!("rule '{}' did not reach a fixed point", rule.name),
                    ));
                }
            }
        }
        Ok(text)
    }

    /// Pass 2: remaining directives become function calls.
    fn compile_calls(&self, text: &str, diagnostics: &mut DiagnosticCollector) -> String {
        self.call
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                let args = &caps[2];
                match self.function_call(name, args) {
                    Some(generated) => generated,
                    None => {
                        diagnostics.warn_with_code(
                            UNMATCHED_DIRECTIVE,
                            format!("directive '{}' matches no rule; it was dropped", &caps[0]),
                        );
                        String::new()
                    }
                }
            })
            .into_owned()
    }

    fn function_call(&self, name: &str, args: &str) -> Option<String> {
        if args.is_empty() {
            return Some(code(&format!("echo {name}();")));
        }

        if let Some(caps) = self.trailing_args.captures(args) {
            let whole = caps.get(0)?;
            let inner = caps.get(1).map_or("", |m| m.as_str());
            let call = if name.eq_ignore_ascii_case("unset") {
                code(&format!("unset({inner});"))
            } else {
                code(&format!("echo {name}({inner});"))
            };
            return Some(format!("{}{call}", &args[..whole.start()]));
        }

        let pairs: Vec<String> = self
            .named_arg
            .captures_iter(args)
            .map(|caps| {
                let key = &caps[1];
                let value = match caps.get(3) {
                    Some(bare) => quote_bare_word(bare.as_str()),
                    None => caps[2].to_string(),
                };
                format!("'{key}' => {value}")
            })
            .collect();
        if pairs.is_empty() {
            return None;
        }
        Some(code(&format!("echo {name}([{}]);", pairs.join(", "))))
    }
}
