/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Shared utilities for stencil crates.

pub mod version;

pub use version::{cargo_version, cli_version, engine_stamp};
