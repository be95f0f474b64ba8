// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! tinydns flat-file backend.
//!
//! Persists every zone into one shared tinydns-data file, one line per
//! record with a type-specific sigil and colon-delimited fields:
//!
//! ```text
//! Zexample.org:ns1.example.org:hostmaster.example.org:1700000001:300:60:691200:3600:7200
//! &example.org::a.ns.example.org:3600
//! +www.example.org:192.0.2.10:60
//! 3www.example.org:20010db8000000000000000000000001:60
//! Cblog.example.org:www.example.org:60
//! @example.org::mail.example.org:10:60
//! 'example.org:v=spf1 -all:60
//! :example.org:257:0 issue "letsencrypt.org":60
//! ```
//!
//! The file is truncated and rewritten with a header comment at the start of
//! every cycle (`pre_batch`), so every zone present in the snapshot is
//! re-emitted and staleness is naturally "always stale". Each insert is an
//! atomic read-modify-write: the new contents land in a temporary file that
//! is renamed into place.

use std::net::Ipv6Addr;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use super::{atomic_write, ZoneBackend, ZoneHandle};
use crate::errors::BackendError;
use crate::record::RecordType;

/// Flat-file adapter emitting tinydns-data lines.
pub struct TinydnsBackend {
    data_path: PathBuf,
    io_lock: Mutex<()>,
}

impl TinydnsBackend {
    /// Create an adapter writing to `data_path`.
    #[must_use]
    pub fn new(data_path: PathBuf) -> Self {
        Self {
            data_path,
            io_lock: Mutex::new(()),
        }
    }

    async fn read_data(&self) -> Result<String, BackendError> {
        match tokio::fs::read_to_string(&self.data_path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(BackendError::io(&self.data_path, e)),
        }
    }
}

/// Escape a field for a tinydns-data line: colons and backslashes become
/// octal escapes so they cannot break the field structure.
fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ':' => out.push_str("\\072"),
            '\\' => out.push_str("\\134"),
            '\n' | '\r' => out.push_str("\\012"),
            _ => out.push(c),
        }
    }
    out
}

/// IPv6 address as the 32 hex digits used by the `3` line extension.
fn ipv6_hex(value: &str) -> Option<String> {
    let addr: Ipv6Addr = value.parse().ok()?;
    Some(addr.octets().iter().map(|b| format!("{b:02x}")).collect())
}

/// Encode one record as a tinydns-data line (without trailing newline).
///
/// Returns `None` for values the format cannot carry (e.g. an undecodable
/// SOA content); callers drop those with a warning.
pub(crate) fn encode_line(
    fqdn: &str,
    rtype: RecordType,
    content: &str,
    priority: u16,
    ttl: u32,
) -> Option<String> {
    match rtype {
        RecordType::Soa => {
            let fields: Vec<&str> = content.split(' ').collect();
            if fields.len() != 7 {
                return None;
            }
            Some(format!(
                "Z{fqdn}:{}:{}:{}:{}:{}:{}:{}:{ttl}",
                fields[0], fields[1], fields[2], fields[3], fields[4], fields[5], fields[6]
            ))
        }
        RecordType::Ns => Some(format!("&{fqdn}::{content}:{ttl}")),
        RecordType::A => Some(format!("+{fqdn}:{content}:{ttl}")),
        RecordType::Aaaa => ipv6_hex(content).map(|hex| format!("3{fqdn}:{hex}:{ttl}")),
        RecordType::Cname => Some(format!("C{fqdn}:{content}:{ttl}")),
        RecordType::Mx => Some(format!("@{fqdn}::{content}:{priority}:{ttl}")),
        RecordType::Txt => Some(format!("'{fqdn}:{}:{ttl}", escape_field(content))),
        RecordType::Caa | RecordType::Srv | RecordType::Sshfp | RecordType::Uri => Some(format!(
            ":{fqdn}:{}:{}:{ttl}",
            rtype.rr_number(),
            escape_field(content)
        )),
    }
}

/// Serial field of the `Z` line for `domain`, if present in `data`.
pub(crate) fn find_soa_serial<'a>(data: &'a str, domain: &str) -> Option<&'a str> {
    for line in data.lines() {
        let Some(rest) = line.strip_prefix('Z') else {
            continue;
        };
        let mut fields = rest.split(':');
        if fields.next() != Some(domain) {
            continue;
        }
        // fqdn:mname:rname:serial:...
        return fields.nth(2);
    }
    None
}

#[async_trait]
impl ZoneBackend for TinydnsBackend {
    fn kind(&self) -> &'static str {
        "tinydns"
    }

    async fn zone_handle(&self, domain: &str) -> Result<ZoneHandle, BackendError> {
        Ok(ZoneHandle::from_name(domain))
    }

    async fn needs_update(
        &self,
        handle: &ZoneHandle,
        last_modified: &str,
    ) -> Result<bool, BackendError> {
        let domain = handle.name().unwrap_or_default();
        let data = match tokio::fs::read_to_string(&self.data_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                warn!(path = %self.data_path.display(), error = %e, "zone data unreadable, treating as stale");
                return Ok(true);
            }
        };
        Ok(find_soa_serial(&data, domain) != Some(last_modified))
    }

    async fn pre_batch(&self) -> Result<(), BackendError> {
        let _io = self.io_lock.lock().await;
        let header = format!(
            "# zone data generated by zonesyncd -- do not edit\n# regenerated {}\n",
            Utc::now().to_rfc3339()
        );
        atomic_write(&self.data_path, header.as_bytes()).await
    }

    async fn insert_record(
        &self,
        handle: &ZoneHandle,
        fqdn: &str,
        rtype: RecordType,
        content: &str,
        priority: u16,
        ttl: u32,
    ) -> Result<(), BackendError> {
        let Some(line) = encode_line(fqdn, rtype, content, priority, ttl) else {
            warn!(
                zone = %handle,
                fqdn,
                rtype = %rtype,
                "dropping record the data format cannot carry"
            );
            return Ok(());
        };

        let _io = self.io_lock.lock().await;
        let mut data = self.read_data().await?;
        data.push_str(&line);
        data.push('\n');
        atomic_write(&self.data_path, data.as_bytes()).await
    }
}

#[cfg(test)]
#[path = "tinydns_tests.rs"]
mod tinydns_tests;
