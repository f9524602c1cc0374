/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for stencil-template using test fixtures.
 */

use pretty_assertions::assert_eq;
use serde_json::json;
use stencil_template::{
    Engine, EngineConfig, FunctionError, RenderContext, RenderOptions, RouteContext,
    TemplateError, Value,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to get the fixture template directory
fn fixture_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join("views")
}

/// Engine over the fixtures with a private cache directory
fn fixture_engine(cache: &TempDir) -> Engine {
    fixture_engine_with(cache, |config| config)
}

fn fixture_engine_with(cache: &TempDir, adjust: impl FnOnce(EngineConfig) -> EngineConfig) -> Engine {
    let config = adjust(EngineConfig::new(fixture_dir(), cache.path().join("view")));
    Engine::new(config).unwrap()
}

fn data(value: serde_json::Value) -> RenderContext {
    RenderContext::from_json(value).expect("render data must be an object")
}

fn render(engine: &Engine, view: &str, value: serde_json::Value) -> String {
    engine
        .render(view, data(value), &RenderOptions::default())
        .unwrap_or_else(|e| panic!("Failed to render {view}: {e}"))
}

#[test]
fn test_escaped_and_raw_echo() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(render(&engine, "escape", json!({"name": "<b>"})), "&lt;b&gt;");
    assert_eq!(render(&engine, "raw", json!({"name": "<b>"})), "<b>");
}

#[test]
fn test_keyed_foreach() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(
        render(&engine, "keyed", json!({"m": {"1": "a", "2": "b"}})),
        "1:a2:b"
    );
    assert_eq!(render(&engine, "keyed", json!({"m": {}})), "");
}

#[test]
fn test_conditional() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(render(&engine, "count", json!({"n": 2})), "many");
    assert_eq!(render(&engine, "count", json!({"n": 1})), "one");
}

#[test]
fn test_nested_loops_keep_separate_state() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(
        render(&engine, "nested", json!({"rows": [["a", "b"], ["c"]]})),
        "12|11|2"
    );
}

#[test]
fn test_loop_state_tokens() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(
        render(&engine, "loop_state", json!({"items": ["a", "b", "c"]})),
        "0=a^/3;1=b/3;2=c!/3;"
    );
}

#[test]
fn test_dotted_access_and_comment() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(
        render(
            &engine,
            "profile",
            json!({"user": {"name": "Ann", "email": "ann@example.com"}})
        ),
        "Ann <ann@example.com>"
    );
}

#[test]
fn test_route_resolution_order() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    let render_routed = |route: Option<RouteContext>| {
        let mut options = RenderOptions::default();
        options.route = route;
        engine.render("list", RenderContext::new(), &options).unwrap()
    };

    assert_eq!(
        render_routed(Some(RouteContext::new("admin", "User", "list"))),
        "controller"
    );
    assert_eq!(
        render_routed(Some(RouteContext::new("admin", "Other", "list"))),
        "module"
    );
    assert_eq!(render_routed(None), "root");
}

#[test]
fn test_empty_view_name_uses_route_action() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    let options = RenderOptions::default().with_route(RouteContext::new("admin", "User", "list"));
    assert_eq!(
        engine.render("", RenderContext::new(), &options).unwrap(),
        "controller"
    );
}

#[test]
fn test_layout_includes_content() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    let options = RenderOptions::default().with_layout("layouts/main");
    let out = engine
        .render("page", data(json!({"title": "Home"})), &options)
        .unwrap();
    assert_eq!(out, "<html><p>Home</p></html>");
}

#[test]
fn test_layout_conflict_writes_nothing() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);

    let options = RenderOptions::default().with_layout("page");
    let err = engine
        .render("page", RenderContext::new(), &options)
        .unwrap_err();
    assert!(matches!(err, TemplateError::LayoutConflict { .. }), "{err:?}");

    // Different name, same file.
    let same_file = fixture_dir().join("page");
    let options = RenderOptions::default().with_layout(same_file.to_string_lossy());
    let err = engine
        .render("page", RenderContext::new(), &options)
        .unwrap_err();
    assert!(matches!(err, TemplateError::LayoutConflict { .. }), "{err:?}");

    assert!(!engine.config().cache_dir.exists());
}

#[test]
fn test_include_shares_scope() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(
        render(&engine, "with_header", json!({"name": "Ann"})),
        "<h1>Ann</h1>Hello, Ann!"
    );
}

#[test]
fn test_include_recursion_is_bounded() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine_with(&cache, |mut config| {
        config.max_include_depth = 5;
        config
    });
    let err = engine
        .render("recursive", RenderContext::new(), &RenderOptions::default())
        .unwrap_err();
    match err {
        TemplateError::RecursiveInclude { name, max_depth } => {
            assert_eq!(name, "recursive");
            assert_eq!(max_depth, 5);
        }
        other => panic!("expected RecursiveInclude, got {other:?}"),
    }
}

#[test]
fn test_function_directive_bundles_arguments() {
    let cache = TempDir::new().unwrap();
    let mut engine = fixture_engine(&cache);
    engine.register_function("link", |args| {
        let params = args.first().cloned().unwrap_or_default();
        let field = |key: &str| {
            params
                .get(&Value::from(key))
                .map(Value::to_output_string)
                .unwrap_or_default()
        };
        Ok(Value::String(format!(
            "{}#{}:{}",
            field("path"),
            field("id"),
            field("mode")
        )))
    });
    assert_eq!(render(&engine, "call", json!({"id": 7})), "/users#7:full");
}

#[test]
fn test_unmatched_directive_renders_empty() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    assert_eq!(render(&engine, "unmatched", json!({})), "ab");

    let transpiled = engine
        .transpile_file(&fixture_dir().join("unmatched.tpl"))
        .unwrap();
    assert_eq!(transpiled.diagnostics.len(), 1);
}

#[test]
fn test_early_exit_is_not_wrapped() {
    let cache = TempDir::new().unwrap();
    let mut engine = fixture_engine(&cache);
    engine.register_function("halt", |_| Err(FunctionError::Exit("cached page".to_string())));

    let err = engine
        .render("exit", RenderContext::new(), &RenderOptions::default())
        .unwrap_err();
    match err {
        TemplateError::EarlyExit { output } => assert_eq!(output, "cached page"),
        other => panic!("expected EarlyExit, got {other:?}"),
    }
}

#[test]
fn test_strict_variables() {
    let cache = TempDir::new().unwrap();
    let lenient = fixture_engine(&cache);
    assert_eq!(render(&lenient, "strict", json!({})), "[]");

    let strict_cache = TempDir::new().unwrap();
    let strict = fixture_engine_with(&strict_cache, |c| c.with_strict_variables(true));
    let err = strict
        .render("strict", RenderContext::new(), &RenderOptions::default())
        .unwrap_err();
    match err {
        TemplateError::RenderFailure { path, message } => {
            assert_eq!(path, fixture_dir().join("strict.tpl"));
            assert!(message.contains("$missing"), "{message}");
        }
        other => panic!("expected RenderFailure, got {other:?}"),
    }
}

#[test]
fn test_missing_view_lists_candidates() {
    let cache = TempDir::new().unwrap();
    let engine = fixture_engine(&cache);
    let err = engine
        .render(
            "nope",
            RenderContext::new(),
            &RenderOptions::default().with_route(RouteContext::new("admin", "User", "index")),
        )
        .unwrap_err();
    match err {
        TemplateError::TemplateNotFound { name, attempted } => {
            assert_eq!(name, "nope");
            assert_eq!(
                attempted,
                vec![
                    fixture_dir().join("admin/user/nope.tpl"),
                    fixture_dir().join("admin/nope.tpl"),
                    fixture_dir().join("nope.tpl"),
                ]
            );
        }
        other => panic!("expected TemplateNotFound, got {other:?}"),
    }
}
