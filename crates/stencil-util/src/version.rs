/*
 * version.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Version handling for stencil
//!
//! Two consumers care about the version:
//! - the CLI, which reports it through `--version`
//! - compiled artifacts, which are stamped with the engine that produced them so
//!   an upgraded engine never executes code generated by an older rule table

const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version reported by pre-1.0 builds.
const DEV_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-dev");

/// Get the version string that should be reported by the CLI
///
/// While the crate version is 0.x.y the CLI reports `0.x.y-dev`, making it
/// obvious that the artifact format may still change between builds.
pub fn cli_version() -> &'static str {
    if CARGO_VERSION.starts_with("0.") {
        DEV_VERSION
    } else {
        CARGO_VERSION
    }
}

/// Get the Cargo package version (for internal use)
pub fn cargo_version() -> &'static str {
    CARGO_VERSION
}

/// Identifier of the engine build, embedded in every artifact header.
pub fn engine_stamp() -> String {
    format!("stencil/{}", cargo_version())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = cli_version();
        assert!(version.starts_with(cargo_version()));
        if cargo_version().starts_with("0.") {
            assert!(version.ends_with("-dev"));
        }
    }

    #[test]
    fn test_engine_stamp() {
        let stamp = engine_stamp();
        assert!(stamp.starts_with("stencil/"));
        assert!(!stamp.contains(char::is_whitespace));
    }
}
