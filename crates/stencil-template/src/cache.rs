/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled-artifact cache.
//!
//! Artifacts live at `<cache_dir>/<key>.<ext>` where the key is a hash of the
//! absolute source path. There is no in-memory index: every lookup stats the
//! filesystem. An artifact is stale when it is missing, older than its source,
//! or carries a header from another artifact format or engine build.
//!
//! Writes go through a temporary file in the cache directory that is renamed
//! into place, so readers in other processes see either the previous artifact
//! or the complete new one. Within a process, compiles of the same key are
//! serialized.

use crate::artifact;
use crate::error::{TemplateError, TemplateResult};
use rustc_hash::FxHasher;
use std::collections::HashMap;
use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

/// Where and when an artifact was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub cache_key: String,
    pub generated_path: PathBuf,
    pub source_modified: SystemTime,
    pub artifact_modified: SystemTime,
    /// Whether this call regenerated the artifact.
    pub recompiled: bool,
}

#[derive(Debug)]
pub struct ArtifactCache {
    cache_dir: PathBuf,
    extension: String,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ArtifactCache {
    pub fn new(cache_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            extension: extension.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Hex FxHash of the absolute source path.
    pub fn cache_key(&self, source: &Path) -> String {
        let absolute = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
        let mut hasher = FxHasher::default();
        hasher.write(absolute.as_os_str().as_encoded_bytes());
        format!("{:016x}", hasher.finish())
    }

    /// Deterministic artifact location for `source`.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", self.cache_key(source), self.extension))
    }

    /// Whether the artifact for `source` can be used as-is.
    pub fn is_fresh(&self, source: &Path) -> TemplateResult<bool> {
        let source_modified = modified(source)
            .map_err(|e| TemplateError::compile_io(source, "cannot stat template", e))?;
        Ok(self.check_fresh(source_modified, &self.artifact_path(source)))
    }

    fn check_fresh(&self, source_modified: SystemTime, artifact: &Path) -> bool {
        let Ok(artifact_modified) = modified(artifact) else {
            return false;
        };
        if source_modified > artifact_modified {
            return false;
        }
        has_current_header(artifact)
    }

    /// Return the artifact for `source`, running `compile` to regenerate it
    /// when it is stale.
    pub fn get_or_compile<F>(&self, source: &Path, compile: F) -> TemplateResult<CompiledArtifact>
    where
        F: FnOnce(&Path) -> TemplateResult<String>,
    {
        let cache_key = self.cache_key(source);
        let generated_path = self.artifact_path(source);
        let source_modified = modified(source)
            .map_err(|e| TemplateError::compile_io(source, "cannot stat template", e))?;

        if self.check_fresh(source_modified, &generated_path) {
            tracing::debug!(source = %source.display(), artifact = %generated_path.display(), "cache hit");
            return self.describe(cache_key, generated_path, source_modified, false, source);
        }

        let key_lock = self.key_lock(&cache_key);
        let _guard = key_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have compiled it while we waited.
        if self.check_fresh(source_modified, &generated_path) {
            return self.describe(cache_key, generated_path, source_modified, false, source);
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| TemplateError::compile_io(source, "cannot create cache directory", e))?;

        let code = compile(source)?;
        self.write_atomically(source, &generated_path, &code)?;

        // Keep artifact mtime >= source mtime even when the source is dated
        // in the future, otherwise it would be recompiled on every call.
        if modified(&generated_path).is_ok_and(|t| t < source_modified) {
            File::options()
                .write(true)
                .open(&generated_path)
                .and_then(|f| f.set_modified(source_modified))
                .map_err(|e| TemplateError::compile_io(source, "cannot set artifact time", e))?;
        }

        tracing::info!(source = %source.display(), artifact = %generated_path.display(), "compiled template");
        self.describe(cache_key, generated_path, source_modified, true, source)
    }

    fn describe(
        &self,
        cache_key: String,
        generated_path: PathBuf,
        source_modified: SystemTime,
        recompiled: bool,
        source: &Path,
    ) -> TemplateResult<CompiledArtifact> {
        let artifact_modified = modified(&generated_path)
            .map_err(|e| TemplateError::compile_io(source, "cannot stat artifact", e))?;
        Ok(CompiledArtifact {
            cache_key,
            generated_path,
            source_modified,
            artifact_modified,
            recompiled,
        })
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    fn write_atomically(&self, source: &Path, target: &Path, code: &str) -> TemplateResult<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(".stencil-")
            .suffix(".tmp")
            .tempfile_in(&self.cache_dir)
            .map_err(|e| TemplateError::compile_io(source, "cannot create temporary artifact", e))?;
        temp.write_all(code.as_bytes())
            .and_then(|()| temp.flush())
            .map_err(|e| TemplateError::compile_io(source, "cannot write artifact", e))?;
        temp.persist(target)
            .map_err(|e| TemplateError::compile_io(source, "cannot move artifact into place", e.error))?;
        Ok(())
    }
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

fn has_current_header(artifact: &Path) -> bool {
    let Ok(file) = File::open(artifact) else {
        return false;
    };
    let mut first = String::new();
    if BufReader::new(file).read_line(&mut first).is_err() {
        return false;
    }
    artifact::is_current_header(first.trim_end_matches('\n'))
}
