/*
 * cache_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Staleness, idempotence and runtime-guard tests against a scratch template
 * directory.
 */

use pretty_assertions::assert_eq;
use stencil_template::artifact::GUARD_MESSAGE;
use stencil_template::{Delimiters, Engine, EngineConfig, RenderContext, RenderOptions, TemplateError};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn views(&self) -> PathBuf {
        self.dir.path().join("views")
    }

    fn cache(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    fn config(&self) -> EngineConfig {
        EngineConfig::new(self.views(), self.cache())
    }

    fn engine(&self) -> Engine {
        Engine::new(self.config()).unwrap()
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.views().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }
}

fn set_mtime(path: &Path, time: std::time::SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[test]
fn test_compile_is_idempotent() {
    let ws = Workspace::new();
    ws.write("home.tpl", "Hello {$name}");
    let engine = ws.engine();

    let first = engine.compile("home").unwrap();
    assert!(first.recompiled);
    let code = fs::read_to_string(&first.generated_path).unwrap();

    let second = engine.compile("home").unwrap();
    assert!(!second.recompiled);
    assert_eq!(second.generated_path, first.generated_path);
    assert_eq!(second.artifact_modified, first.artifact_modified);
    assert_eq!(fs::read_to_string(&second.generated_path).unwrap(), code);
}

#[test]
fn test_edited_source_is_recompiled() {
    let ws = Workspace::new();
    let source = ws.write("home.tpl", "v1");
    let engine = ws.engine();
    let options = RenderOptions::default();

    assert_eq!(engine.render("home", RenderContext::new(), &options).unwrap(), "v1");
    let before = engine.compile("home").unwrap();

    fs::write(&source, "v2").unwrap();
    set_mtime(&source, before.artifact_modified + Duration::from_secs(5));

    assert_eq!(engine.render("home", RenderContext::new(), &options).unwrap(), "v2");
    let after = engine.compile("home").unwrap();
    assert!(after.artifact_modified >= after.source_modified);
}

#[test]
fn test_include_has_independent_freshness() {
    let ws = Workspace::new();
    ws.write("outer.tpl", "[{include file=inner}]");
    let inner = ws.write("inner.tpl", "one");
    let engine = ws.engine();
    let options = RenderOptions::default();

    assert_eq!(engine.render("outer", RenderContext::new(), &options).unwrap(), "[one]");

    let inner_artifact = engine.compile("inner").unwrap();
    fs::write(&inner, "two").unwrap();
    set_mtime(&inner, inner_artifact.artifact_modified + Duration::from_secs(5));

    assert!(!engine.compile("outer").unwrap().recompiled);
    assert_eq!(engine.render("outer", RenderContext::new(), &options).unwrap(), "[two]");
}

#[test]
fn test_locate_falls_back_to_ancestors() {
    let ws = Workspace::new();
    ws.write("shared.tpl", "shared");
    let engine = ws.engine();

    let three_up = ws.views().join("a/b/c/shared");
    let artifact = engine.compile(&three_up.to_string_lossy()).unwrap();
    assert!(artifact.recompiled);

    let four_up = ws.views().join("a/b/c/d/shared");
    let err = engine.compile(&four_up.to_string_lossy()).unwrap_err();
    match err {
        TemplateError::TemplateNotFound { attempted, .. } => assert_eq!(attempted.len(), 4),
        other => panic!("expected TemplateNotFound, got {other:?}"),
    }
}

#[test]
fn test_foreign_artifact_is_refused() {
    let ws = Workspace::new();
    ws.write("home.tpl", "hi");
    let engine = ws.engine();

    let artifact = engine.compile("home").unwrap();
    fs::write(&artifact.generated_path, "<?tpl echo 'not ours'; ?>").unwrap();

    let err = engine.load(&artifact).unwrap_err();
    match err {
        TemplateError::RenderFailure { message, .. } => assert_eq!(message, GUARD_MESSAGE),
        other => panic!("expected RenderFailure, got {other:?}"),
    }

    // The cache does not trust it either: the next compile replaces it.
    let replaced = engine.compile("home").unwrap();
    assert!(replaced.recompiled);
    assert!(engine.load(&replaced).is_ok());
}

#[test]
fn test_custom_delimiters() {
    let ws = Workspace::new();
    ws.write("custom.tpl", "<% $name %> {$name} <%if $n%>yes<%/if%>");
    let engine = Engine::new(
        ws.config()
            .with_delimiters(Delimiters::new("<%", "%>").unwrap()),
    )
    .unwrap();

    let data = RenderContext::new().with("name", "<x>").with("n", 1i64);
    assert_eq!(
        engine
            .render("custom", data, &RenderOptions::default())
            .unwrap(),
        "&lt;x&gt; {$name} yes"
    );
}

#[test]
fn test_yaml_config() {
    let ws = Workspace::new();
    ws.write("home.tpl", "[% $name %]");
    let config_path = ws.dir.path().join("stencil.yml");
    fs::write(
        &config_path,
        "template-dir: views\ncache-dir: cache\ndelimiters:\n  left: '[%'\n  right: '%]'\n",
    )
    .unwrap();

    let engine = Engine::new(EngineConfig::from_yaml_file(&config_path).unwrap()).unwrap();
    let data = RenderContext::new().with("name", "yaml");
    assert_eq!(
        engine.render("home", data, &RenderOptions::default()).unwrap(),
        "yaml"
    );
}

#[test]
fn test_unbalanced_template_is_not_cached() {
    let ws = Workspace::new();
    let source = ws.write("broken.tpl", "{if $a}open");
    let engine = ws.engine();

    for _ in 0..2 {
        let err = engine.compile("broken").unwrap_err();
        match err {
            TemplateError::CompileFailure { path, .. } => assert_eq!(path, source),
            other => panic!("expected CompileFailure, got {other:?}"),
        }
        assert!(!engine.cache().artifact_path(&source).exists());
    }

    let err = engine
        .render("broken", RenderContext::new().with("a", 1i64), &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, TemplateError::CompileFailure { path, .. } if path == source));
}
