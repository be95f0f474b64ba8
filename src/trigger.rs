// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Trigger surface.
//!
//! Three independent triggers can request a cycle: the periodic timer, an
//! inbound zone-change notification and a manual operator command. All of
//! them funnel into [`crate::engine::SyncEngine::try_sync`], which is the
//! single mutual-exclusion gate; a trigger arriving mid-cycle is coalesced.
//!
//! The chat transport itself is external. This module only classifies lines
//! handed to it (`sender<TAB>message` over an optional Unix socket) and
//! formats the outcome back into a short status string for the sender.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use crate::config::TriggerConfig;
use crate::engine::{CycleOutcome, SyncEngine};
use crate::errors::SyncError;

/// A classified inbound trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Zone-change notice from the trusted sender; normal cycle
    Notification,
    /// Operator command; forced cycle ignoring the checkpoint comparison
    Operator,
}

impl Trigger {
    /// Whether this trigger forces the cycle past the version comparison.
    #[must_use]
    pub fn is_forced(self) -> bool {
        matches!(self, Self::Operator)
    }
}

/// Classify one inbound chat line.
///
/// A message from the trusted sender starting with the zone-change marker is
/// a notification. A message of the form `<prefix>sync` from a trusted
/// operator is a forced-cycle command. Everything else is ignored.
#[must_use]
pub fn classify_line(sender: &str, message: &str, config: &TriggerConfig) -> Option<Trigger> {
    let message = message.trim();

    if config.trusted_sender.as_deref() == Some(sender)
        && message.starts_with(&config.change_marker)
    {
        return Some(Trigger::Notification);
    }

    if let Some(command) = message.strip_prefix(&config.command_prefix) {
        let command = command.split(' ').next().unwrap_or_default();
        if command.eq_ignore_ascii_case("sync")
            && config.trusted_operators.iter().any(|op| op == sender)
        {
            return Some(Trigger::Operator);
        }
    }

    None
}

/// Render a cycle result as the short status string sent back to the
/// trigger surface.
#[must_use]
pub fn format_outcome(result: &Result<CycleOutcome, SyncError>) -> String {
    match result {
        Ok(CycleOutcome::Applied {
            updated,
            skipped,
            failed,
            version,
            source_hash,
        }) => format!(
            "zone deployed: version {version} (source {source_hash}), \
             {updated} updated, {skipped} unchanged, {failed} failed"
        ),
        Ok(CycleOutcome::NotStale { version }) => {
            format!("zone unchanged at version {version}")
        }
        Ok(CycleOutcome::InFlight) => "a sync cycle is already running".to_string(),
        Err(e) => format!("sync failed: {e}"),
    }
}

/// Run the periodic trigger until the process exits.
pub async fn run_periodic(engine: Arc<SyncEngine>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        debug!("periodic trigger firing");
        let result = engine.try_sync(false).await;
        if let Err(e) = &result {
            warn!(error = %e, "periodic cycle failed");
        }
    }
}

/// Listen on a Unix socket for notification and operator lines.
///
/// Each line is `sender<TAB>message`; the outcome status string is written
/// back on the same connection. The socket file is re-created on startup.
///
/// # Errors
///
/// Returns an error when the socket cannot be bound.
pub async fn run_notify_listener(
    engine: Arc<SyncEngine>,
    socket_path: &Path,
    config: TriggerConfig,
) -> anyhow::Result<()> {
    match tokio::fs::remove_file(socket_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "notification listener ready");

    loop {
        let (stream, _) = listener.accept().await?;
        let engine = engine.clone();
        let config = config.clone();
        tokio::spawn(async move {
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let (sender, message) = match line.split_once('\t') {
                    Some(parts) => parts,
                    None => {
                        debug!(line, "ignoring malformed notification line");
                        continue;
                    }
                };

                let Some(trigger) = classify_line(sender, message, &config) else {
                    continue;
                };
                info!(sender, ?trigger, "trigger received");

                let result = engine.try_sync(trigger.is_forced()).await;
                let mut status = format_outcome(&result);
                status.push('\n');
                if let Err(e) = writer.write_all(status.as_bytes()).await {
                    debug!(error = %e, "status reply not delivered");
                    break;
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod trigger_tests;
