// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Snapshot data model and HTTPS fetcher.
//!
//! The upstream service exposes the full authoritative dataset as one JSON
//! document. A snapshot is fetched atomically at the start of a cycle, owned
//! by that cycle and discarded at its end; it is never partially applied.

use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::errors::FetchError;
use crate::record::RawRecord;
use crate::retry::retry_http;

/// Number of hex characters of the source hash kept for status messages.
const SOURCE_HASH_LEN: usize = 10;

/// One fetched view of all domains and records, tagged with an opaque
/// monotonic version marker.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    /// Opaque version marker for the whole dataset
    pub last_modified: String,
    /// Ordered sequence of domains
    pub domains: Vec<DomainData>,
}

/// All data for one domain within a snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainData {
    /// The domain name, e.g. `example.org`
    pub name: String,
    /// Opaque per-domain modification marker, doubles as the SOA serial
    pub last_modified: String,
    /// Owner handle as reported upstream
    #[serde(default)]
    pub owner: String,
    /// Ordered, untrusted records
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

/// A snapshot plus the short hash of the raw response body.
#[derive(Debug, Clone)]
pub struct FetchedSnapshot {
    /// The decoded snapshot
    pub snapshot: Snapshot,
    /// First [`SOURCE_HASH_LEN`] hex chars of the body's SHA-256
    pub source_hash: String,
}

/// HTTP client for the snapshot endpoint.
///
/// Owns its connection pool; constructed once at startup and shared by the
/// engine for the process lifetime.
pub struct SnapshotClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl SnapshotClient {
    /// Build a client bound to `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error when the TLS backend cannot be
    /// initialized.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    /// Fetch and decode one snapshot, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the endpoint cannot be reached within
    /// the retry budget, answers with a non-success status, or the body is
    /// not a valid snapshot document.
    pub async fn fetch(&self) -> Result<FetchedSnapshot, FetchError> {
        retry_http(|| self.fetch_once(), "fetch snapshot").await
    }

    async fn fetch_once(&self) -> Result<FetchedSnapshot, FetchError> {
        let response = self
            .http
            .get(self.endpoint.as_str())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                endpoint: self.endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: self.endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Request {
            endpoint: self.endpoint.to_string(),
            source,
        })?;

        let snapshot: Snapshot = serde_json::from_slice(&body)?;
        let source_hash = source_hash(&body);
        debug!(
            version = %snapshot.last_modified,
            domains = snapshot.domains.len(),
            source_hash = %source_hash,
            "fetched snapshot"
        );

        Ok(FetchedSnapshot {
            snapshot,
            source_hash,
        })
    }
}

/// Short hex digest of the raw snapshot body, reported in status messages.
#[must_use]
pub fn source_hash(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    let digest = format!("{:x}", hasher.finalize());
    digest[..SOURCE_HASH_LEN].to_string()
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod snapshot_tests;
