/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The engine facade.
//!
//! An [`Engine`] owns one configuration and everything derived from it: the
//! resolver, the transpiler (with its delimiter-specific rule table), the
//! artifact cache and the function registry. It is `Send + Sync`; share one
//! per template directory.

use crate::artifact::{self, Program};
use crate::cache::{ArtifactCache, CompiledArtifact};
use crate::config::EngineConfig;
use crate::context::{DEBUG_VAR, PJAX_VAR, RenderContext, TEMPLATE_FILE_VAR, VERSION_VAR};
use crate::diagnostics::Diagnostic;
use crate::error::{TemplateError, TemplateResult};
use crate::resolver::{Resolver, RouteContext};
use crate::runtime::builtins::{FunctionError, FunctionRegistry};
use crate::runtime::{IncludeLoader, Interpreter};
use crate::transpiler::{Transpiled, Transpiler};
use crate::value::Value;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Alias of [`TEMPLATE_FILE_VAR`] kept for layouts that use the short name.
const TEMPLATE_FILE_ALIAS: &str = "template_file";

/// Per-render options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Layout that wraps the view; the view is reachable from it as
    /// `$__template_file`.
    pub layout: Option<String>,
    pub route: Option<RouteContext>,
    /// Partial-page request flag, exposed as `$__pjax`.
    pub pjax: bool,
}

impl RenderOptions {
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn with_route(mut self, route: RouteContext) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_pjax(mut self, pjax: bool) -> Self {
        self.pjax = pjax;
        self
    }
}

/// A view resolved together with its optional layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit {
    pub logical_name: String,
    pub layout_name: Option<String>,
    pub content_path: PathBuf,
    pub layout_path: Option<PathBuf>,
}

impl CompileUnit {
    /// The template that is compiled and executed first: the layout when one
    /// is bound, otherwise the content.
    pub fn primary_path(&self) -> &Path {
        self.layout_path.as_deref().unwrap_or(&self.content_path)
    }
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    resolver: Resolver,
    transpiler: Transpiler,
    cache: ArtifactCache,
    functions: FunctionRegistry,
}

impl Engine {
    /// Build an engine. Fails with [`TemplateError::Config`] on invalid
    /// delimiters or settings.
    pub fn new(config: EngineConfig) -> TemplateResult<Self> {
        config.validate()?;
        let transpiler = Transpiler::new(&config.delimiters)?;
        let resolver = Resolver::new(config.template_dir.clone());
        let cache = ArtifactCache::new(
            config.cache_dir.clone(),
            config.artifact_extension.clone(),
        );
        Ok(Self {
            config,
            resolver,
            transpiler,
            cache,
            functions: FunctionRegistry::with_builtins(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Make `name` callable from templates, both as `name(...)` in generated
    /// code and as a `{name k=v}` directive.
    pub fn register_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
    }

    pub fn resolve(&self, name: &str, route: Option<&RouteContext>) -> TemplateResult<PathBuf> {
        self.resolver.resolve(name, route)
    }

    pub fn locate(&self, name_or_path: &str) -> TemplateResult<PathBuf> {
        self.resolver.locate(name_or_path)
    }

    /// Resolve a view and its layout.
    ///
    /// A layout naming the view itself is rejected before anything is
    /// resolved or written.
    pub fn bind(
        &self,
        view: &str,
        layout: Option<&str>,
        route: Option<&RouteContext>,
    ) -> TemplateResult<CompileUnit> {
        if layout == Some(view) {
            return Err(TemplateError::LayoutConflict {
                path: PathBuf::from(view),
            });
        }

        let content_path = self.resolver.resolve(view, route)?;
        let layout_path = match layout {
            Some(layout) => {
                let path = self.resolver.resolve(layout, route)?;
                if path == content_path {
                    return Err(TemplateError::LayoutConflict { path });
                }
                Some(path)
            }
            None => None,
        };

        Ok(CompileUnit {
            logical_name: view.to_string(),
            layout_name: layout.map(str::to_string),
            content_path,
            layout_path,
        })
    }

    /// Locate `name_or_path` and bring its artifact up to date.
    pub fn compile(&self, name_or_path: &str) -> TemplateResult<CompiledArtifact> {
        let source = self.locate(name_or_path)?;
        self.compile_path(&source)
    }

    /// Bring the artifact for the template at `source` up to date.
    pub fn compile_path(&self, source: &Path) -> TemplateResult<CompiledArtifact> {
        self.cache.get_or_compile(source, |path| {
            let transpiled = self.transpiler.transpile_file(path)?;
            report(path, &transpiled.diagnostics);
            artifact::validate_generated(&transpiled.code, path)?;
            Ok(transpiled.code)
        })
    }

    /// Transpile a template file without touching the cache.
    pub fn transpile_file(&self, path: &Path) -> TemplateResult<Transpiled> {
        self.transpiler.transpile_file(path)
    }

    /// Read and parse a compiled artifact, checking its header first.
    pub fn load(&self, artifact: &CompiledArtifact) -> TemplateResult<Program> {
        let path = &artifact.generated_path;
        let text = std::fs::read_to_string(path)
            .map_err(|e| TemplateError::compile_io(path, "cannot read artifact", e))?;
        artifact::load_program(&text, path)
    }

    /// Render a view, wrapped in a layout when `options.layout` is set.
    pub fn render(
        &self,
        view: &str,
        data: RenderContext,
        options: &RenderOptions,
    ) -> TemplateResult<String> {
        let unit = self.bind(view, options.layout.as_deref(), options.route.as_ref())?;
        let template_file = if unit.layout_path.is_some() {
            unit.content_path.display().to_string()
        } else {
            String::new()
        };
        let context = self.with_metadata(data, template_file, options.pjax);
        self.execute(unit.primary_path(), context)
    }

    /// Render the template file at `path` with no layout.
    pub fn render_file(&self, path: &Path, data: RenderContext) -> TemplateResult<String> {
        let context = self.with_metadata(data, String::new(), false);
        self.execute(path, context)
    }

    fn execute(&self, source: &Path, context: RenderContext) -> TemplateResult<String> {
        let artifact = self.compile_path(source)?;
        let program = self.load(&artifact)?;
        let output = Interpreter::new(&self.functions, self, context)
            .with_strict_variables(self.config.strict_variables)
            .with_max_include_depth(self.config.max_include_depth)
            .execute(&program, source)?;
        tracing::debug!(template = %source.display(), bytes = output.len(), "rendered");
        Ok(output)
    }

    fn with_metadata(
        &self,
        data: RenderContext,
        template_file: String,
        pjax: bool,
    ) -> RenderContext {
        let mut context = data;
        context.insert(TEMPLATE_FILE_VAR, template_file.clone());
        context.insert(TEMPLATE_FILE_ALIAS, template_file);
        context.insert(PJAX_VAR, pjax);
        context.insert(DEBUG_VAR, self.config.debug);
        context.insert(VERSION_VAR, self.asset_version());
        context
    }

    /// `__v`: the current unix time in debug mode so assets are never cached,
    /// otherwise the configured version.
    fn asset_version(&self) -> String {
        if self.config.debug {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
                .to_string()
        } else {
            self.config.version.clone().unwrap_or_default()
        }
    }
}

impl IncludeLoader for Engine {
    fn load_include(&self, name: &str) -> TemplateResult<(PathBuf, Program)> {
        let source = self.locate(name)?;
        let artifact = self.compile_path(&source)?;
        let program = self.load(&artifact)?;
        Ok((source, program))
    }
}

fn report(path: &Path, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        tracing::warn!(template = %path.display(), "{diagnostic}");
    }
}
