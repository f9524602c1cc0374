/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template resolution.
//!
//! Two lookups live here:
//!
//! - [`Resolver::resolve`] maps a logical view name plus an optional
//!   [`RouteContext`] to a template file, trying module/controller specific
//!   locations before the template root.
//! - [`Resolver::locate`] is used for includes and direct compiles. It accepts
//!   either a bare name or a path, appends the template extension and, when
//!   the file is missing, walks up to three parent directories looking for a
//!   file with the same basename.

use crate::error::{TemplateError, TemplateResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// File extension of template sources.
pub const TEMPLATE_EXTENSION: &str = "tpl";

/// How many parent directories [`Resolver::locate`] climbs.
pub const MAX_ANCESTOR_HOPS: usize = 3;

/// Routing information of the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteContext {
    pub module: String,
    pub controller: String,
    pub action: String,
}

impl RouteContext {
    pub fn new(
        module: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            controller: controller.into(),
            action: action.into(),
        }
    }
}

/// Path-search policy over a template root.
#[derive(Debug, Clone)]
pub struct Resolver {
    template_dir: PathBuf,
}

impl Resolver {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Candidate paths for a logical view name, in search order.
    pub fn candidates(&self, name: &str, route: Option<&RouteContext>) -> Vec<PathBuf> {
        let mut name = name;
        let mut paths = Vec::with_capacity(4);

        if let Some(route) = route {
            if name.is_empty() {
                name = &route.action;
            }
            let module_dir = under(&self.template_dir, &route.module);
            let controller_dir = under(&module_dir, &route.controller.to_lowercase());
            paths.push(with_template_extension(under(&controller_dir, name)));
            paths.push(with_template_extension(under(&module_dir, name)));
        }

        paths.push(with_template_extension(under(&self.template_dir, name)));

        let as_path = Path::new(name);
        if as_path.is_absolute() && as_path.starts_with(&self.template_dir) {
            paths.push(with_template_extension(as_path.to_path_buf()));
        }

        paths
    }

    /// Resolve a logical view name to an existing template file.
    pub fn resolve(&self, name: &str, route: Option<&RouteContext>) -> TemplateResult<PathBuf> {
        let candidates = self.candidates(name, route);
        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            tracing::debug!(name, path = %found.display(), "resolved template");
            return Ok(found.clone());
        }

        let name = match (name.is_empty(), route) {
            (true, Some(route)) => route.action.clone(),
            _ => name.to_string(),
        };
        Err(TemplateError::TemplateNotFound {
            name,
            attempted: candidates,
        })
    }

    /// Find a template by bare name or path, falling back to ancestor
    /// directories.
    pub fn locate(&self, name_or_path: &str) -> TemplateResult<PathBuf> {
        let mut path = if has_separator(name_or_path) {
            PathBuf::from(name_or_path)
        } else {
            self.template_dir
                .join(name_or_path.trim_end_matches(['/', '\\']))
        };
        if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
            path = with_template_extension(path);
        }

        let mut attempted = vec![path.clone()];
        if path.is_file() {
            return Ok(path);
        }

        let Some(basename) = path.file_name().map(|b| b.to_os_string()) else {
            return Err(TemplateError::TemplateNotFound {
                name: name_or_path.to_string(),
                attempted,
            });
        };

        let mut dir = path.parent().map(Path::to_path_buf);
        for _ in 0..MAX_ANCESTOR_HOPS {
            let Some(parent) = dir.as_deref().and_then(Path::parent) else {
                break;
            };
            let candidate = parent.join(&basename);
            if candidate.is_file() {
                tracing::debug!(
                    name = name_or_path,
                    path = %candidate.display(),
                    "located template in ancestor directory"
                );
                return Ok(candidate);
            }
            attempted.push(candidate);
            dir = Some(parent.to_path_buf());
        }

        Err(TemplateError::TemplateNotFound {
            name: name_or_path.to_string(),
            attempted,
        })
    }
}

/// Join `name` under `dir`, ignoring leading separators in `name` so an
/// absolute-looking name never escapes `dir`.
fn under(dir: &Path, name: &str) -> PathBuf {
    let trimmed = name.trim_start_matches(['/', '\\']);
    if trimmed.is_empty() {
        dir.to_path_buf()
    } else {
        dir.join(trimmed)
    }
}

/// Append `.tpl` to the whole file name (`a.b` becomes `a.b.tpl`).
fn with_template_extension(path: PathBuf) -> PathBuf {
    let mut os: OsString = path.into_os_string();
    os.push(".");
    os.push(TEMPLATE_EXTENSION);
    PathBuf::from(os)
}

fn has_separator(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_candidates_order_with_route() {
        let resolver = Resolver::new("/views");
        let route = RouteContext::new("admin", "UserController", "list");

        assert_eq!(
            resolver.candidates("index", Some(&route)),
            vec![
                PathBuf::from("/views/admin/usercontroller/index.tpl"),
                PathBuf::from("/views/admin/index.tpl"),
                PathBuf::from("/views/index.tpl"),
            ]
        );
    }

    #[test]
    fn test_empty_name_uses_action() {
        let resolver = Resolver::new("/views");
        let route = RouteContext::new("site", "Home", "about");

        let candidates = resolver.candidates("", Some(&route));
        assert_eq!(candidates[0], PathBuf::from("/views/site/home/about.tpl"));
    }

    #[test]
    fn test_absolute_name_under_root() {
        let resolver = Resolver::new("/views");

        assert_eq!(
            resolver.candidates("/views/mail/welcome", None),
            vec![
                PathBuf::from("/views/views/mail/welcome.tpl"),
                PathBuf::from("/views/mail/welcome.tpl"),
            ]
        );
        assert_eq!(resolver.candidates("/etc/passwd", None).len(), 1);
    }

    #[test]
    fn test_resolve_prefers_controller_template() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("shop/cart/index.tpl"));
        touch(&root.join("shop/index.tpl"));
        touch(&root.join("index.tpl"));

        let resolver = Resolver::new(root);
        let route = RouteContext::new("shop", "Cart", "view");
        assert_eq!(
            resolver.resolve("index", Some(&route)).unwrap(),
            root.join("shop/cart/index.tpl")
        );

        let other = RouteContext::new("shop", "Checkout", "view");
        assert_eq!(
            resolver.resolve("index", Some(&other)).unwrap(),
            root.join("shop/index.tpl")
        );
        assert_eq!(resolver.resolve("index", None).unwrap(), root.join("index.tpl"));
    }

    #[test]
    fn test_resolve_not_found_lists_attempts() {
        let dir = TempDir::new().unwrap();
        let resolver = Resolver::new(dir.path());
        let route = RouteContext::new("m", "C", "a");

        match resolver.resolve("missing", Some(&route)) {
            Err(TemplateError::TemplateNotFound { name, attempted }) => {
                assert_eq!(name, "missing");
                assert_eq!(attempted.len(), 3);
            }
            other => panic!("expected TemplateNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_locate_bare_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("header.tpl"));
        let resolver = Resolver::new(dir.path());

        assert_eq!(resolver.locate("header").unwrap(), dir.path().join("header.tpl"));
        assert_eq!(resolver.locate("header.tpl").unwrap(), dir.path().join("header.tpl"));
    }

    #[test]
    fn test_locate_ancestor_fallback() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        touch(&base.join("name.tpl"));
        fs::create_dir_all(base.join("a/b/c/d")).unwrap();
        let resolver = Resolver::new(base);

        let start = base.join("a/b/name");
        assert_eq!(
            resolver.locate(start.to_str().unwrap()).unwrap(),
            base.join("name.tpl")
        );

        let three_up = base.join("a/b/c/name");
        assert_eq!(
            resolver.locate(three_up.to_str().unwrap()).unwrap(),
            base.join("name.tpl")
        );

        let four_up = base.join("a/b/c/d/name");
        match resolver.locate(four_up.to_str().unwrap()) {
            Err(TemplateError::TemplateNotFound { attempted, .. }) => {
                assert_eq!(attempted.len(), 1 + MAX_ANCESTOR_HOPS);
            }
            other => panic!("expected TemplateNotFound, got {other:?}"),
        }
    }
}
