// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for zone synchronization.
//!
//! This module provides specialized error types for:
//! - Snapshot fetch failures (network, status, decode)
//! - Backend persistence failures (database, file, reload)
//! - Configuration problems (fatal at startup only)
//!
//! Record-level validation failures are deliberately *not* errors: a rejected
//! record is logged and dropped while the rest of the domain continues (see
//! [`crate::record::RejectReason`]).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching the zone snapshot.
///
/// Any of these aborts the running cycle; the checkpoint is left untouched
/// and the next trigger retries from scratch.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP request itself failed (connect error, timeout, TLS).
    #[error("snapshot request to {endpoint} failed: {source}")]
    Request {
        /// The configured snapshot endpoint
        endpoint: String,
        /// Underlying reqwest error
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("snapshot endpoint {endpoint} returned HTTP {status}")]
    Status {
        /// The configured snapshot endpoint
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body was not a valid snapshot document.
    #[error("snapshot body could not be decoded: {source}")]
    Decode {
        /// Underlying JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Errors raised by a backend adapter while persisting zone state.
///
/// A `BackendError` is scoped to one domain (or, for `pre_batch`, to the
/// cycle); the engine logs it, counts the domain as failed and moves on.
/// The failed domain's staleness marker is not advanced, so it is retried
/// on the next cycle.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Relational backend query failure.
    #[error("database operation failed for zone '{zone}': {source}")]
    Database {
        /// The zone being written when the query failed
        zone: String,
        /// Underlying sqlx error
        source: sqlx::Error,
    },

    /// An insert was attempted without an open per-domain transaction.
    ///
    /// This indicates `insert_record` was called before `pre_update`, which
    /// the engine never does; it exists so the adapter does not have to
    /// panic on contract misuse.
    #[error("no open transaction for zone '{zone}'")]
    NoTransaction {
        /// The zone the insert was aimed at
        zone: String,
    },

    /// File I/O failure in a file-based backend or the checkpoint store.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// The file or directory involved
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A persisted zone file exists but could not be decoded.
    #[error("zone state at {path} is not valid JSON: {source}")]
    ZoneDecode {
        /// Path of the unreadable zone file
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// The downstream reload command failed or was killed.
    #[error("reload command {command:?} failed: {reason}")]
    ReloadFailed {
        /// The configured reload command line
        command: Vec<String>,
        /// Exit status or spawn error description
        reason: String,
    },

    /// The downstream reload command did not finish within the timeout.
    #[error("reload command {command:?} timed out after {timeout_secs}s")]
    ReloadTimeout {
        /// The configured reload command line
        command: Vec<String>,
        /// The configured bound in seconds
        timeout_secs: u64,
    },
}

impl BackendError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors, fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// Path passed via `--config`
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the expected schema.
    #[error("cannot parse config file: {source}")]
    Parse {
        /// Underlying YAML error
        #[from]
        source: serde_yaml::Error,
    },

    /// The configuration parsed but is semantically invalid.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong
        reason: String,
    },
}

/// Composite error for a synchronization cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Snapshot fetch failure (cycle aborted, checkpoint unchanged)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cycle-scoped backend failure (`pre_batch`)
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The checkpoint could not be persisted after a completed loop
    #[error("cannot persist checkpoint: {0}")]
    Checkpoint(std::io::Error),
}

impl SyncError {
    /// Returns true if the error is transient and the next trigger should
    /// simply retry the cycle.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(_) | Self::Checkpoint(_) => true,
            Self::Backend(err) => !matches!(err, BackendError::NoTransaction { .. }),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
