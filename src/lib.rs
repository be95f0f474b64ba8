// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Zonesync - Authoritative DNS Zone Synchronization Daemon
//!
//! Zonesync keeps a DNS server backend in lockstep with an externally hosted
//! authoritative dataset. It periodically fetches a snapshot of all domains
//! and records, decides per domain whether the persisted state is stale,
//! validates every record, and re-materializes changed zones in the form the
//! configured backend serves.
//!
//! ## Overview
//!
//! This library provides the core functionality for the zonesync daemon:
//!
//! - Snapshot fetching with retry and a short source hash for reporting
//! - Record validation and the CNAME exclusivity pass
//! - The hierarchical zone-tree builder for JSON-tree backends
//! - A pluggable backend adapter contract with three implementations
//! - The sync engine with single-flight cycles and durable checkpointing
//!
//! ## Modules
//!
//! - [`config`] - YAML configuration, validated at startup
//! - [`snapshot`] - snapshot data model and HTTPS fetcher
//! - [`record`] - record types, validation, exclusivity
//! - [`zone_tree`] - the per-label zone tree and its encodings
//! - [`backend`] - the adapter contract and backend variants
//! - [`engine`] - the cycle orchestrator
//! - [`checkpoint`] - last-applied-version persistence
//! - [`trigger`] - periodic, notification and operator triggers
//! - [`metrics`] - Prometheus metrics and the `/metrics` server
//!
//! ## Example
//!
//! ```rust,no_run
//! use zonesync::record::{validate, RawRecord};
//!
//! let raw = RawRecord {
//!     name: "www".to_string(),
//!     rtype: "A".to_string(),
//!     value: "192.0.2.10".to_string(),
//!     priority: None,
//! };
//!
//! let record = validate("example.org", &raw).unwrap();
//! assert_eq!(record.fqdn, "www.example.org");
//! ```
//!
//! ## Backends
//!
//! - **PowerDNS** - classic `domains`/`records` MySQL schema, one
//!   transaction per zone
//! - **tinydns** - a single tinydns-data file, rewritten each cycle
//! - **JSON tree** - per-zone directories of nested JSON served by a
//!   CoreDNS-style process

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod record;
pub mod retry;
pub mod snapshot;
pub mod trigger;
pub mod zone_tree;
