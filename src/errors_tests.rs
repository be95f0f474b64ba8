// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

use super::*;

#[test]
fn test_fetch_status_display() {
    let err = FetchError::Status {
        endpoint: "https://dns.example.org/export".to_string(),
        status: 503,
    };
    let message = err.to_string();
    assert!(message.contains("503"));
    assert!(message.contains("https://dns.example.org/export"));
}

#[test]
fn test_backend_no_transaction_display() {
    let err = BackendError::NoTransaction {
        zone: "example.org".to_string(),
    };
    assert!(err.to_string().contains("example.org"));
}

#[test]
fn test_backend_reload_timeout_display() {
    let err = BackendError::ReloadTimeout {
        command: vec!["systemctl".to_string(), "reload".to_string()],
        timeout_secs: 10,
    };
    let message = err.to_string();
    assert!(message.contains("10s"));
    assert!(message.contains("systemctl"));
}

#[test]
fn test_config_invalid_display() {
    let err = ConfigError::Invalid {
        reason: "at least one nameserver is required".to_string(),
    };
    assert!(err.to_string().contains("nameserver"));
}

#[test]
fn test_sync_error_transience() {
    let fetch = SyncError::Fetch(FetchError::Status {
        endpoint: "https://dns.example.org".to_string(),
        status: 500,
    });
    assert!(fetch.is_transient());

    let misuse = SyncError::Backend(BackendError::NoTransaction {
        zone: "example.org".to_string(),
    });
    assert!(!misuse.is_transient());

    let io = SyncError::Backend(BackendError::io(
        "/var/lib/zonesync/zones",
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    ));
    assert!(io.is_transient());
}

#[test]
fn test_sync_error_from_fetch() {
    let err: SyncError = FetchError::Status {
        endpoint: "x".to_string(),
        status: 404,
    }
    .into();
    assert!(matches!(err, SyncError::Fetch(_)));
}
