// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hierarchical JSON zone-tree backend.
//!
//! Persists each zone as a directory holding `zone_data.json`
//! (`{last_modified, soa, zone}`) plus a generated loader module, and keeps
//! one shared server configuration file with a stanza per zone. A downstream
//! CoreDNS-style process is told to reload only when that shared file
//! actually changed.
//!
//! While a domain is being updated, records fold into a *staging* file
//! (`zone_build.json`); the served `zone_data.json` is only replaced by an
//! atomic rename in `post_update`, after the whole domain succeeded. A
//! failed domain therefore leaves the old served state (and its
//! `last_modified`) intact and is retried on the next cycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{atomic_write, ZoneBackend, ZoneHandle};
use crate::errors::BackendError;
use crate::record::RecordType;
use crate::snapshot::DomainData;
use crate::zone_tree::{relative_name, ZoneNode};

/// Name of the served zone file inside a zone directory.
const ZONE_DATA_FILE: &str = "zone_data.json";

/// Name of the staging file a domain is folded into.
const ZONE_BUILD_FILE: &str = "zone_build.json";

/// Name of the generated loader module.
const LOADER_FILE: &str = "zone.mjs";

/// Structured SOA as served to the zone consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaData {
    pub mname: String,
    pub rname: String,
    pub serial: String,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// Staging state while one domain is folded record by record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ZoneBuild {
    last_modified: String,
    #[serde(default)]
    soa: Option<SoaData>,
    #[serde(default)]
    zone: ZoneNode,
}

/// JSON-tree adapter writing per-zone directories plus a shared Corefile.
pub struct JsonTreeBackend {
    zones_dir: PathBuf,
    corefile_path: PathBuf,
    grpc_endpoint: String,
    bind_addresses: Vec<String>,
    reload_command: Vec<String>,
    reload_timeout: Duration,
    io_lock: Mutex<()>,
}

impl JsonTreeBackend {
    /// Create an adapter rooted at `zones_dir`.
    #[must_use]
    pub fn new(
        zones_dir: PathBuf,
        corefile_path: PathBuf,
        grpc_endpoint: String,
        bind_addresses: Vec<String>,
        reload_command: Vec<String>,
        reload_timeout_secs: u64,
    ) -> Self {
        Self {
            zones_dir,
            corefile_path,
            grpc_endpoint,
            bind_addresses,
            reload_command,
            reload_timeout: Duration::from_secs(reload_timeout_secs),
            io_lock: Mutex::new(()),
        }
    }

    fn zone_dir(&self, domain: &str) -> PathBuf {
        self.zones_dir.join(domain)
    }

    fn build_path(&self, domain: &str) -> PathBuf {
        self.zone_dir(domain).join(ZONE_BUILD_FILE)
    }

    fn data_path(&self, domain: &str) -> PathBuf {
        self.zone_dir(domain).join(ZONE_DATA_FILE)
    }

    async fn read_build(&self, domain: &str) -> Result<ZoneBuild, BackendError> {
        let path = self.build_path(domain);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| BackendError::io(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| BackendError::ZoneDecode { path, source })
    }

    async fn write_build(&self, domain: &str, build: &ZoneBuild) -> Result<(), BackendError> {
        let bytes = serde_json::to_vec_pretty(build).expect("zone build serializes");
        atomic_write(&self.build_path(domain), &bytes).await
    }

    /// The per-zone stanza appended to the shared server config.
    fn zone_stanza(&self, domain: &str) -> String {
        format!(
            "{domain} {{\n  grpc . {}\n  log\n  bind {}\n}}\n",
            self.grpc_endpoint,
            self.bind_addresses.join(" ")
        )
    }

    /// Append the zone's stanza to the shared config if it is not there
    /// yet. Returns true when the file changed.
    async fn ensure_stanza(&self, domain: &str) -> Result<bool, BackendError> {
        let contents = match tokio::fs::read_to_string(&self.corefile_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(BackendError::io(&self.corefile_path, e)),
        };

        let marker = format!("{domain} {{");
        if contents
            .lines()
            .any(|line| line.trim_start().starts_with(&marker))
        {
            return Ok(false);
        }

        let mut updated = contents;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push('\n');
        updated.push_str(&self.zone_stanza(domain));
        atomic_write(&self.corefile_path, updated.as_bytes()).await?;
        info!(domain, path = %self.corefile_path.display(), "added zone stanza to server config");
        Ok(true)
    }

    /// Run the configured reload command, bounded by the timeout.
    async fn reload_server(&self) -> Result<(), BackendError> {
        let Some((program, args)) = self.reload_command.split_first() else {
            return Ok(());
        };

        let mut command = tokio::process::Command::new(program);
        command.args(args);

        let status = tokio::time::timeout(self.reload_timeout, async {
            command
                .status()
                .await
                .map_err(|e| BackendError::ReloadFailed {
                    command: self.reload_command.clone(),
                    reason: e.to_string(),
                })
        })
        .await
        .map_err(|_| BackendError::ReloadTimeout {
            command: self.reload_command.clone(),
            timeout_secs: self.reload_timeout.as_secs(),
        })??;

        if !status.success() {
            return Err(BackendError::ReloadFailed {
                command: self.reload_command.clone(),
                reason: format!("exit status {status}"),
            });
        }
        debug!("server config reloaded");
        Ok(())
    }
}

/// Decode a synthesized SOA content string into its structured form.
pub(crate) fn decode_soa(content: &str) -> Option<SoaData> {
    let fields: Vec<&str> = content.split(' ').collect();
    if fields.len() != 7 {
        return None;
    }
    Some(SoaData {
        mname: fields[0].to_string(),
        rname: fields[1].to_string(),
        serial: fields[2].to_string(),
        refresh: fields[3].parse().ok()?,
        retry: fields[4].parse().ok()?,
        expire: fields[5].parse().ok()?,
        minimum: fields[6].parse().ok()?,
    })
}

/// The generated loader module next to each zone file.
fn loader_module() -> &'static str {
    concat!(
        "// generated by zonesyncd -- do not edit\n",
        "import { readFileSync } from 'node:fs';\n",
        "\n",
        "const zone = JSON.parse(\n",
        "  readFileSync(new URL('./zone_data.json', import.meta.url), 'utf8'),\n",
        ");\n",
        "\n",
        "export default zone;\n",
    )
}

#[async_trait]
impl ZoneBackend for JsonTreeBackend {
    fn kind(&self) -> &'static str {
        "json-tree"
    }

    async fn zone_handle(&self, domain: &str) -> Result<ZoneHandle, BackendError> {
        let dir = self.zone_dir(domain);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BackendError::io(&dir, e))?;
        Ok(ZoneHandle::from_name(domain))
    }

    async fn needs_update(
        &self,
        handle: &ZoneHandle,
        last_modified: &str,
    ) -> Result<bool, BackendError> {
        let domain = handle.name().unwrap_or_default();
        let path = self.data_path(domain);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "zone file unreadable, treating as stale");
                return Ok(true);
            }
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => Ok(value.get("last_modified").and_then(|v| v.as_str()) != Some(last_modified)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "zone file undecodable, treating as stale");
                Ok(true)
            }
        }
    }

    async fn pre_update(
        &self,
        handle: &ZoneHandle,
        domain: &DomainData,
    ) -> Result<(), BackendError> {
        let name = handle.name().unwrap_or(&domain.name);
        // Fresh tree every cycle; the served file stays untouched until the
        // staging state is promoted in post_update.
        let build = ZoneBuild {
            last_modified: domain.last_modified.clone(),
            soa: None,
            zone: ZoneNode::default(),
        };
        self.write_build(name, &build).await
    }

    async fn insert_record(
        &self,
        handle: &ZoneHandle,
        fqdn: &str,
        rtype: RecordType,
        content: &str,
        priority: u16,
        _ttl: u32,
    ) -> Result<(), BackendError> {
        let domain = handle.name().unwrap_or_default();
        let _io = self.io_lock.lock().await;
        let mut build = self.read_build(domain).await?;

        if rtype == RecordType::Soa {
            match decode_soa(content) {
                Some(soa) => build.soa = Some(soa),
                None => warn!(domain, content, "dropping undecodable SOA content"),
            }
        } else {
            match relative_name(fqdn, domain) {
                Some(rel) => build.zone.insert(&rel, rtype, content, priority),
                None => warn!(domain, fqdn, "dropping record outside its zone"),
            }
        }

        self.write_build(domain, &build).await
    }

    async fn post_update(&self, handle: &ZoneHandle) -> Result<(), BackendError> {
        let domain = handle.name().unwrap_or_default();
        let build = self.read_build(domain).await?;

        let served = json!({
            "last_modified": build.last_modified,
            "soa": build.soa,
            "zone": build.zone.to_zone_json(),
        });
        let bytes = serde_json::to_vec_pretty(&served).expect("zone data serializes");
        atomic_write(&self.data_path(domain), &bytes).await?;

        let loader_path = self.zone_dir(domain).join(LOADER_FILE);
        atomic_write(&loader_path, loader_module().as_bytes()).await?;

        let build_path = self.build_path(domain);
        if let Err(e) = tokio::fs::remove_file(&build_path).await {
            debug!(path = %build_path.display(), error = %e, "staging file not removed");
        }

        let _io = self.io_lock.lock().await;
        let config_changed = self.ensure_stanza(domain).await?;
        if config_changed {
            self.reload_server().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "json_tree_tests.rs"]
mod json_tree_tests;
