//! Staging area for fetched scripts.
//!
//! Fetched content is written to a uniquely named file inside a dedicated
//! directory before the interpreter ever sees it. Every issued path is
//! recorded in a registry so that [`StagingArea::cleanup_all`] can remove
//! whatever individual jobs left behind.

use ab_protocol::config_models::StagingConfig;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to write staged script at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Owns the staging directory and the registry of staged files.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    extension: String,
    prelude: Option<String>,
    issued: Mutex<HashSet<PathBuf>>,
}

impl StagingArea {
    /// Create a staging area rooted at `dir`.
    ///
    /// The directory is created lazily on the first [`stage`](Self::stage).
    pub fn new(dir: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            dir,
            extension: extension.into(),
            prelude: None,
            issued: Mutex::new(HashSet::new()),
        }
    }

    /// Create a staging area under the OS temp directory.
    pub fn from_config(config: &StagingConfig) -> Self {
        let mut area = Self::new(
            std::env::temp_dir().join(&config.dir_name),
            config.extension.clone(),
        );
        area.prelude = config.prelude.clone().filter(|p| !p.trim().is_empty());
        area
    }

    /// Text to write in front of every staged script.
    pub fn with_prelude(mut self, prelude: impl Into<String>) -> Self {
        self.prelude = Some(prelude.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` to a new file and return its path.
    ///
    /// The content goes to an anonymous temp file in the staging directory
    /// first and is renamed into place only after it has been flushed and
    /// synced, so a returned path always refers to a complete file.
    pub fn stage(&self, content: &[u8]) -> Result<PathBuf, StageError> {
        let path = self
            .dir
            .join(format!("script-{}.{}", Uuid::new_v4(), self.extension));
        let write_err = |source| StageError::Write {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(write_err)?;

        let mut file = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        if let Some(prelude) = &self.prelude {
            file.write_all(prelude.as_bytes()).map_err(write_err)?;
            if !prelude.ends_with('\n') {
                file.write_all(b"\n").map_err(write_err)?;
            }
        }
        file.write_all(content).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist_noclobber(&path)
            .map_err(|e| write_err(e.error))?;

        self.registry().insert(path.clone());
        tracing::debug!(path = %path.display(), "script staged");
        Ok(path)
    }

    /// Delete a staged file.
    ///
    /// Only paths issued by this staging area are deleted, and each at most
    /// once. Returns `true` if this call removed the path from the registry.
    pub fn cleanup(&self, path: &Path) -> bool {
        if !self.registry().remove(path) {
            return false;
        }
        remove_quietly(path);
        true
    }

    /// Delete every staged file still registered. Returns how many there were.
    pub fn cleanup_all(&self) -> usize {
        let paths: Vec<PathBuf> = self.registry().drain().collect();
        for path in &paths {
            remove_quietly(path);
        }
        if !paths.is_empty() {
            tracing::info!(count = paths.len(), "removed leftover staged scripts");
        }
        paths.len()
    }

    /// Paths issued and not yet cleaned up.
    pub fn staged_paths(&self) -> Vec<PathBuf> {
        self.registry().iter().cloned().collect()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        // The set stays consistent even if a holder panicked.
        self.issued.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.cleanup_all();
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "staged script removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove staged script"),
    }
}
