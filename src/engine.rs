// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The synchronization engine.
//!
//! One engine instance owns the snapshot client, the backend adapter and
//! the checkpoint store, constructed once at startup and shared behind an
//! `Arc`. A cycle is one logical unit of work:
//!
//! ```text
//! IDLE -> FETCHING -> (version unchanged: IDLE)
//!      -> PER_DOMAIN_LOOP -> CHECKPOINTING -> IDLE
//! ```
//!
//! Fetch failures abort the cycle with the checkpoint untouched. A single
//! domain's failure is contained: it is logged, counted, left stale for the
//! next cycle, and the loop moves on. The checkpoint advances once the whole
//! snapshot has been attempted, so the fleet is never blocked by one broken
//! zone.
//!
//! All triggers (timer, notification, operator command) funnel through
//! [`SyncEngine::try_sync`], which coalesces: a trigger arriving while a
//! cycle is in flight is dropped with an [`CycleOutcome::InFlight`] outcome
//! rather than queued or run concurrently.

use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::ZoneBackend;
use crate::checkpoint::CheckpointStore;
use crate::config::{Config, SoaConfig};
use crate::errors::{BackendError, SyncError};
use crate::metrics;
use crate::record::{self, RejectReason, ValidatedRecord};
use crate::snapshot::{DomainData, SnapshotClient};

/// TTL of the synthesized SOA record.
const SOA_TTL: u32 = 7200;

/// TTL of the synthesized apex NS records.
const NS_TTL: u32 = 3600;

/// TTL of the optional informational apex TXT record.
const NOTICE_TTL: u32 = 300;

/// SOA timing fields appended after the serial: refresh, retry, expire,
/// minimum.
const SOA_TIMERS: &str = "300 60 691200 3600";

/// Result of one requested cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The snapshot was applied
    Applied {
        /// Domains whose backend state was rewritten
        updated: usize,
        /// Domains skipped because they were not stale
        skipped: usize,
        /// Domains whose update failed and will be retried next cycle
        failed: usize,
        /// The snapshot version now recorded in the checkpoint
        version: String,
        /// Short hash of the raw snapshot body
        source_hash: String,
    },
    /// The snapshot version matched the checkpoint; nothing was written
    NotStale {
        /// The unchanged version
        version: String,
    },
    /// A cycle was already in flight; this trigger was coalesced
    InFlight,
}

/// The orchestrator: owns every collaborator of a cycle.
pub struct SyncEngine {
    client: SnapshotClient,
    backend: Box<dyn ZoneBackend>,
    checkpoint: CheckpointStore,
    soa: SoaConfig,
    nameservers: Vec<String>,
    record_ttl: u32,
    zone_notice: Option<String>,
    gate: Mutex<()>,
}

impl SyncEngine {
    /// Assemble an engine from its collaborators and the relevant
    /// configuration.
    #[must_use]
    pub fn new(
        client: SnapshotClient,
        backend: Box<dyn ZoneBackend>,
        checkpoint: CheckpointStore,
        config: &Config,
    ) -> Self {
        Self {
            client,
            backend,
            checkpoint,
            soa: config.soa.clone(),
            nameservers: config.nameservers.clone(),
            record_ttl: config.record_ttl,
            zone_notice: config.zone_notice.clone(),
            gate: Mutex::new(()),
        }
    }

    /// Request a cycle; at most one runs at a time.
    ///
    /// With `force` the snapshot is applied even when its version matches
    /// the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] when the fetch, a cycle-scoped backend hook
    /// or the checkpoint write fails. Per-domain failures are contained and
    /// reported in the outcome instead.
    pub async fn try_sync(&self, force: bool) -> Result<CycleOutcome, SyncError> {
        let Ok(_guard) = self.gate.try_lock() else {
            info!("cycle already in flight, coalescing trigger");
            metrics::record_cycle_outcome("in_flight");
            return Ok(CycleOutcome::InFlight);
        };
        let started = Instant::now();
        let result = self.run_cycle(force).await;
        match &result {
            Ok(CycleOutcome::Applied { .. }) => {
                metrics::record_cycle_outcome("applied");
                metrics::record_cycle_duration(started.elapsed());
            }
            Ok(CycleOutcome::NotStale { .. }) => metrics::record_cycle_outcome("not_stale"),
            Ok(CycleOutcome::InFlight) => {}
            Err(_) => metrics::record_cycle_outcome("error"),
        }
        result
    }

    async fn run_cycle(&self, force: bool) -> Result<CycleOutcome, SyncError> {
        let fetched = self.client.fetch().await?;
        let snapshot = fetched.snapshot;

        let last_applied = self
            .checkpoint
            .load()
            .await
            .map_err(SyncError::Checkpoint)?;
        if !force && last_applied.as_deref() == Some(snapshot.last_modified.as_str()) {
            debug!(version = %snapshot.last_modified, "snapshot unchanged, nothing to do");
            return Ok(CycleOutcome::NotStale {
                version: snapshot.last_modified,
            });
        }

        info!(
            version = %snapshot.last_modified,
            source_hash = %fetched.source_hash,
            domains = snapshot.domains.len(),
            backend = self.backend.kind(),
            "fresh snapshot, deploying"
        );

        self.backend.pre_batch().await?;

        let mut updated = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;
        for domain in &snapshot.domains {
            match self.sync_domain(domain).await {
                Ok(true) => {
                    updated += 1;
                    metrics::record_domain_updated();
                }
                Ok(false) => skipped += 1,
                Err(e) => {
                    failed += 1;
                    metrics::record_domain_failed();
                    error!(
                        domain = %domain.name,
                        error = %e,
                        "domain update failed, left stale for next cycle"
                    );
                }
            }
        }

        self.checkpoint
            .store(&snapshot.last_modified)
            .await
            .map_err(SyncError::Checkpoint)?;

        info!(
            version = %snapshot.last_modified,
            updated,
            skipped,
            failed,
            "snapshot applied"
        );
        Ok(CycleOutcome::Applied {
            updated,
            skipped,
            failed,
            version: snapshot.last_modified,
            source_hash: fetched.source_hash,
        })
    }

    /// Update one domain. Returns `Ok(false)` when the domain was skipped
    /// because the backend already holds its version.
    async fn sync_domain(&self, domain: &DomainData) -> Result<bool, BackendError> {
        let handle = self.backend.zone_handle(&domain.name).await?;

        if !self
            .backend
            .needs_update(&handle, &domain.last_modified)
            .await?
        {
            debug!(domain = %domain.name, "skipping, not modified");
            return Ok(false);
        }

        info!(domain = %domain.name, owner = %domain.owner, "updating zone");
        self.backend.pre_update(&handle, domain).await?;

        let soa_content = format!(
            "{} {} {} {SOA_TIMERS}",
            self.soa.primary_ns, self.soa.admin_email, domain.last_modified
        );
        self.backend
            .insert_record(
                &handle,
                &domain.name,
                record::RecordType::Soa,
                &soa_content,
                0,
                SOA_TTL,
            )
            .await?;

        if let Some(notice) = &self.zone_notice {
            self.backend
                .insert_record(
                    &handle,
                    &domain.name,
                    record::RecordType::Txt,
                    notice,
                    0,
                    NOTICE_TTL,
                )
                .await?;
        }

        for ns in &self.nameservers {
            self.backend
                .insert_record(&handle, &domain.name, record::RecordType::Ns, ns, 0, NS_TTL)
                .await?;
        }

        let records = self.validate_domain(domain);
        for rec in &records {
            self.backend
                .insert_record(
                    &handle,
                    &rec.fqdn,
                    rec.rtype,
                    &rec.value,
                    rec.priority,
                    self.record_ttl,
                )
                .await?;
        }

        self.backend.post_update(&handle).await?;
        Ok(true)
    }

    /// Validate a domain's records and apply the CNAME exclusivity pass.
    fn validate_domain(&self, domain: &DomainData) -> Vec<ValidatedRecord> {
        let mut valid = Vec::with_capacity(domain.records.len());
        for raw in &domain.records {
            match record::validate(&domain.name, raw) {
                Ok(rec) => valid.push(rec),
                Err(RejectReason::UnsupportedType) => {
                    debug!(
                        domain = %domain.name,
                        name = %raw.name,
                        rtype = %raw.rtype,
                        "ignoring unsupported record type"
                    );
                    metrics::record_record_rejected(RejectReason::UnsupportedType);
                }
                Err(reason) => {
                    warn!(
                        domain = %domain.name,
                        name = %raw.name,
                        rtype = %raw.rtype,
                        reason = %reason,
                        "rejecting invalid record"
                    );
                    metrics::record_record_rejected(reason);
                }
            }
        }
        record::enforce_cname_exclusivity(valid)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
