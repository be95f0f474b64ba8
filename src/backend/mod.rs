// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend adapter contract.
//!
//! The sync engine drives exactly one [`ZoneBackend`] and knows nothing
//! about how zones are persisted. Each variant owns its own zone identity
//! ([`ZoneHandle`]): an integer primary key for the relational store, the
//! domain name itself for the file-based stores. Handles are produced and
//! consumed only through this interface.
//!
//! Side-effect contract: an adapter must never leave partially written state
//! observable as complete. The relational adapter wraps each domain in a
//! transaction; the file adapters write through a temporary file and rename.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::config::{BackendConfig, Config};
use crate::errors::BackendError;
use crate::record::RecordType;
use crate::snapshot::DomainData;

pub mod json_tree;
pub mod powerdns;
pub mod tinydns;

/// Opaque per-zone identity.
///
/// The engine only passes handles back into the adapter that produced them;
/// it never inspects the representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneHandle(Repr);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr {
    Id(i64),
    Name(String),
}

impl ZoneHandle {
    pub(crate) fn from_id(id: i64) -> Self {
        Self(Repr::Id(id))
    }

    pub(crate) fn from_name(name: impl Into<String>) -> Self {
        Self(Repr::Name(name.into()))
    }

    pub(crate) fn id(&self) -> Option<i64> {
        match &self.0 {
            Repr::Id(id) => Some(*id),
            Repr::Name(_) => None,
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        match &self.0 {
            Repr::Id(_) => None,
            Repr::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for ZoneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Id(id) => write!(f, "#{id}"),
            Repr::Name(name) => f.write_str(name),
        }
    }
}

/// Capability set implemented by every backend variant.
///
/// Call order per cycle: `pre_batch` once, then per stale domain
/// `zone_handle` → `needs_update` → `pre_update` → `insert_record`* →
/// `post_update`. Errors are domain-scoped: the engine logs them, leaves the
/// domain stale and continues with the rest of the snapshot.
#[async_trait]
pub trait ZoneBackend: Send + Sync {
    /// Short variant name for logging.
    fn kind(&self) -> &'static str;

    /// Resolve (or create) the backend-specific identity of a zone.
    async fn zone_handle(&self, domain: &str) -> Result<ZoneHandle, BackendError>;

    /// Whether the persisted zone is stale relative to `last_modified`.
    ///
    /// Absent or unreadable persisted state counts as stale: the contract
    /// fails open toward re-syncing, never toward skipping.
    async fn needs_update(
        &self,
        handle: &ZoneHandle,
        last_modified: &str,
    ) -> Result<bool, BackendError>;

    /// Hook run once before the whole snapshot is processed.
    async fn pre_batch(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Hook run once per domain before its first record is written.
    async fn pre_update(
        &self,
        handle: &ZoneHandle,
        domain: &DomainData,
    ) -> Result<(), BackendError> {
        let _ = (handle, domain);
        Ok(())
    }

    /// Persist one record. The single persistence primitive.
    async fn insert_record(
        &self,
        handle: &ZoneHandle,
        fqdn: &str,
        rtype: RecordType,
        content: &str,
        priority: u16,
        ttl: u32,
    ) -> Result<(), BackendError>;

    /// Hook run once per domain after all records have been written.
    async fn post_update(&self, handle: &ZoneHandle) -> Result<(), BackendError> {
        let _ = handle;
        Ok(())
    }
}

/// Construct the configured backend variant.
///
/// # Errors
///
/// Returns an error when the backend cannot be initialized, e.g. the
/// database is unreachable at startup.
pub async fn from_config(config: &Config) -> anyhow::Result<Box<dyn ZoneBackend>> {
    match &config.backend {
        BackendConfig::Powerdns { database_url } => {
            let backend = powerdns::PowerdnsBackend::connect(database_url).await?;
            Ok(Box::new(backend))
        }
        BackendConfig::Tinydns { data_path } => {
            Ok(Box::new(tinydns::TinydnsBackend::new(data_path.clone())))
        }
        BackendConfig::JsonTree {
            zones_dir,
            corefile_path,
            grpc_endpoint,
            bind_addresses,
            reload_command,
            reload_timeout_secs,
        } => Ok(Box::new(json_tree::JsonTreeBackend::new(
            zones_dir.clone(),
            corefile_path.clone(),
            grpc_endpoint.clone(),
            bind_addresses.clone(),
            reload_command.clone(),
            *reload_timeout_secs,
        ))),
    }
}

/// Write `contents` to `path` atomically: write a sibling temporary file,
/// then rename it into place. A reader never observes a half-written file.
pub(crate) async fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), BackendError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| BackendError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| BackendError::io(path, e))?;
    Ok(())
}
