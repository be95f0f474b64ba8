// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Checkpoint persistence.
//!
//! The checkpoint is a single text file holding the last fully applied
//! snapshot version. It is read at the start of every cycle and atomically
//! overwritten (write temp, rename) only after the whole domain loop has
//! been attempted. It is created on the first successful run and never
//! deleted.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

/// Durable store for the last applied snapshot version.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by `path`. Nothing is touched until the first
    /// read or write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last applied version, `None` on the very first run.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than the file not existing.
    pub async fn load(&self) -> std::io::Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist `version`, replacing the previous checkpoint atomically.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; the previous checkpoint survives
    /// a failed write.
    pub async fn store(&self, version: &str) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, version).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!(version, path = %self.path.display(), "checkpoint advanced");
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod checkpoint_tests;
