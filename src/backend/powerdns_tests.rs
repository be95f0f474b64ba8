// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `powerdns.rs`
//!
//! Query behavior against a live database is covered by integration
//! environments; these tests pin down the pure pieces the adapter's
//! staleness decision is built from.

use super::*;

#[test]
fn test_soa_serial_token() {
    let content = "ns1.example.org. hostmaster.example.org. 1700000001 300 60 691200 3600";
    assert_eq!(soa_serial_token(content), Some("1700000001"));
}

#[test]
fn test_soa_serial_token_too_short() {
    assert_eq!(soa_serial_token("ns1.example.org."), None);
    assert_eq!(soa_serial_token(""), None);
}

#[test]
fn test_soa_serial_differs_means_stale() {
    let content = "ns1.example.org. hostmaster.example.org. 1700000001 300 60 691200 3600";
    assert_ne!(soa_serial_token(content), Some("1700000002"));
}

#[test]
fn test_zone_handle_is_integer_id() {
    let handle = ZoneHandle::from_id(42);
    assert_eq!(handle.id(), Some(42));
    assert_eq!(handle.name(), None);
    assert_eq!(handle.to_string(), "#42");
}
