// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `trigger.rs`

use super::*;
use crate::errors::FetchError;

fn test_config() -> TriggerConfig {
    TriggerConfig {
        trusted_sender: Some("wikibot".to_string()),
        change_marker: "[[Domain:".to_string(),
        trusted_operators: vec!["ops".to_string()],
        command_prefix: "!".to_string(),
    }
}

#[test]
fn test_notification_from_trusted_sender() {
    let config = test_config();
    assert_eq!(
        classify_line("wikibot", "[[Domain:example.org]] edited", &config),
        Some(Trigger::Notification)
    );
}

#[test]
fn test_notification_requires_trusted_sender() {
    let config = test_config();
    assert_eq!(
        classify_line("impostor", "[[Domain:example.org]] edited", &config),
        None
    );
}

#[test]
fn test_notification_requires_marker_prefix() {
    let config = test_config();
    assert_eq!(
        classify_line("wikibot", "something [[Domain:example.org]]", &config),
        None
    );
}

#[test]
fn test_operator_sync_command() {
    let config = test_config();
    assert_eq!(
        classify_line("ops", "!sync", &config),
        Some(Trigger::Operator)
    );
    assert_eq!(
        classify_line("ops", "!SYNC now please", &config),
        Some(Trigger::Operator)
    );
}

#[test]
fn test_operator_command_requires_trust() {
    let config = test_config();
    assert_eq!(classify_line("rando", "!sync", &config), None);
}

#[test]
fn test_unrelated_chatter_ignored() {
    let config = test_config();
    assert_eq!(classify_line("wikibot", "hello there", &config), None);
    assert_eq!(classify_line("ops", "!version", &config), None);
}

#[test]
fn test_operator_trigger_is_forced() {
    assert!(Trigger::Operator.is_forced());
    assert!(!Trigger::Notification.is_forced());
}

#[test]
fn test_format_applied_outcome() {
    let outcome = Ok(CycleOutcome::Applied {
        updated: 3,
        skipped: 10,
        failed: 1,
        version: "1700000002".to_string(),
        source_hash: "ab12cd34ef".to_string(),
    });
    let status = format_outcome(&outcome);
    assert!(status.contains("1700000002"));
    assert!(status.contains("ab12cd34ef"));
    assert!(status.contains("3 updated"));
    assert!(status.contains("1 failed"));
}

#[test]
fn test_format_not_stale_outcome() {
    let outcome = Ok(CycleOutcome::NotStale {
        version: "1700000002".to_string(),
    });
    assert!(format_outcome(&outcome).contains("unchanged"));
}

#[test]
fn test_format_in_flight_outcome() {
    let outcome = Ok(CycleOutcome::InFlight);
    assert!(format_outcome(&outcome).contains("already running"));
}

#[test]
fn test_format_error_outcome() {
    let outcome = Err(SyncError::Fetch(FetchError::Status {
        endpoint: "https://dns.example.org".to_string(),
        status: 502,
    }));
    let status = format_outcome(&outcome);
    assert!(status.starts_with("sync failed"));
    assert!(status.contains("502"));
}
