// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PowerDNS-style relational backend.
//!
//! Writes into the classic `domains`/`records` schema consumed by the
//! PowerDNS generic-MySQL backend. Each domain update runs inside one
//! transaction: `pre_update` opens it and deletes all prior records,
//! `insert_record` appends inside it, `post_update` commits. A failed domain
//! drops the transaction, the delete rolls back and the old SOA serial
//! survives, so the domain stays stale and is retried next cycle.
//!
//! Staleness is read from the persisted SOA record: its content is
//! `mname rname serial refresh retry expire minimum` and the third token is
//! the serial the engine last wrote.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, Row, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ZoneBackend, ZoneHandle};
use crate::errors::BackendError;
use crate::record::RecordType;
use crate::snapshot::DomainData;

/// One open per-domain transaction, tagged with the zone it belongs to.
struct OpenTx {
    zone: String,
    tx: Transaction<'static, MySql>,
}

/// Relational adapter over a MySQL PowerDNS schema.
pub struct PowerdnsBackend {
    pool: MySqlPool,
    current: Mutex<Option<OpenTx>>,
}

impl PowerdnsBackend {
    /// Connect to the database at startup.
    ///
    /// # Errors
    ///
    /// Returns the underlying sqlx error when the database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool,
            current: Mutex::new(None),
        })
    }

    fn db_err(zone: &str, source: sqlx::Error) -> BackendError {
        BackendError::Database {
            zone: zone.to_string(),
            source,
        }
    }
}

/// Extract the serial token from a stored SOA content string.
///
/// The content is `mname rname serial refresh retry expire minimum`; the
/// serial is the third whitespace-separated token.
pub(crate) fn soa_serial_token(content: &str) -> Option<&str> {
    content.split(' ').nth(2)
}

#[async_trait]
impl ZoneBackend for PowerdnsBackend {
    fn kind(&self) -> &'static str {
        "powerdns"
    }

    async fn zone_handle(&self, domain: &str) -> Result<ZoneHandle, BackendError> {
        let row = sqlx::query("SELECT id FROM domains WHERE name = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_err(domain, e))?;

        if let Some(row) = row {
            let id: i64 = row.try_get(0).map_err(|e| Self::db_err(domain, e))?;
            return Ok(ZoneHandle::from_id(id));
        }

        let result = sqlx::query(
            "INSERT INTO domains (name, master, last_check, type, notified_serial, account) \
             VALUES (?, '', NULL, 'MASTER', NULL, '')",
        )
        .bind(domain)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err(domain, e))?;

        debug!(domain, id = result.last_insert_id(), "created zone row");
        Ok(ZoneHandle::from_id(result.last_insert_id() as i64))
    }

    async fn needs_update(
        &self,
        handle: &ZoneHandle,
        last_modified: &str,
    ) -> Result<bool, BackendError> {
        let zone = handle.to_string();
        let row = sqlx::query("SELECT content FROM records WHERE domain_id = ? AND type = 'SOA' LIMIT 1")
            .bind(handle.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_err(&zone, e))?;

        let Some(row) = row else {
            return Ok(true);
        };
        let content: String = row.try_get(0).map_err(|e| Self::db_err(&zone, e))?;

        Ok(soa_serial_token(&content) != Some(last_modified))
    }

    async fn pre_update(
        &self,
        handle: &ZoneHandle,
        domain: &DomainData,
    ) -> Result<(), BackendError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::db_err(&domain.name, e))?;

        sqlx::query("DELETE FROM records WHERE domain_id = ?")
            .bind(handle.id())
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::db_err(&domain.name, e))?;

        // Replacing a leftover transaction from a failed domain rolls it
        // back on drop.
        *self.current.lock().await = Some(OpenTx {
            zone: domain.name.clone(),
            tx,
        });
        Ok(())
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
        let mut guard = self.current.lock().await;
        let open = guard.as_mut().ok_or_else(|| BackendError::NoTransaction {
            zone: handle.to_string(),
        })?;
        let zone = open.zone.clone();

        sqlx::query(
            "INSERT INTO records (domain_id, name, type, content, ttl, prio, disabled, ordername, auth) \
             VALUES (?, ?, ?, ?, ?, ?, 0, NULL, 1)",
        )
        .bind(handle.id())
        .bind(fqdn)
        .bind(rtype.as_str())
        .bind(content)
        .bind(ttl)
        .bind(u32::from(priority))
        .execute(&mut *open.tx)
        .await
        .map_err(|e| Self::db_err(&zone, e))?;

        Ok(())
    }

    async fn post_update(&self, handle: &ZoneHandle) -> Result<(), BackendError> {
        let open = self
            .current
            .lock()
            .await
            .take()
            .ok_or_else(|| BackendError::NoTransaction {
                zone: handle.to_string(),
            })?;

        let zone = open.zone;
        open.tx.commit().await.map_err(|e| Self::db_err(&zone, e))?;
        debug!(zone, "committed zone update");
        Ok(())
    }
}

#[cfg(test)]
#[path = "powerdns_tests.rs"]
mod powerdns_tests;
