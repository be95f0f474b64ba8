// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the zone synchronization daemon.
//!
//! All metrics live in one registry under the `zonesync_` namespace and are
//! exposed by a small axum server on the configured listen address.

use std::net::SocketAddr;
use std::sync::LazyLock;
use std::time::Duration;

use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use tracing::info;

use crate::record::RejectReason;

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "zonesync";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of sync cycles by outcome
///
/// Labels:
/// - `outcome`: `applied`, `not_stale`, `in_flight`, `error`
pub static SYNC_CYCLES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cycles_total"),
        "Total number of sync cycles by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of applied cycles in seconds
pub static CYCLE_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_cycle_duration_seconds"),
        "Duration of applied sync cycles in seconds",
    )
    .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of domains rewritten in their backend
pub static DOMAINS_UPDATED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_domains_updated_total"),
        "Total number of domains rewritten in their backend",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of domain updates that failed and were left stale
pub static DOMAINS_FAILED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_domains_failed_total"),
        "Total number of domain updates that failed and were left stale",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of records rejected by the validator
///
/// Labels:
/// - `reason`: validator rejection reason
pub static RECORDS_REJECTED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_records_rejected_total"),
        "Total number of records rejected by the validator",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a finished cycle's outcome
pub fn record_cycle_outcome(outcome: &str) {
    SYNC_CYCLES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record how long an applied cycle took
pub fn record_cycle_duration(duration: Duration) {
    CYCLE_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record one domain rewritten in its backend
pub fn record_domain_updated() {
    DOMAINS_UPDATED_TOTAL.inc();
}

/// Record one failed domain update
pub fn record_domain_failed() {
    DOMAINS_FAILED_TOTAL.inc();
}

/// Record one rejected record
pub fn record_record_rejected(reason: RejectReason) {
    RECORDS_REJECTED_TOTAL
        .with_label_values(&[reason.as_str()])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

async fn metrics_handler() -> (axum::http::StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {e}"),
        ),
    }
}

/// Serve `/metrics` on `addr` until the process exits.
///
/// # Errors
///
/// Returns an error when the listener cannot be bound.
pub async fn run_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    let router = axum::Router::new().route("/metrics", axum::routing::get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "metrics server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle_outcome() {
        record_cycle_outcome("applied");
        let counter = SYNC_CYCLES_TOTAL.with_label_values(&["applied"]);
        assert!(counter.get() > 0.0);
    }

    #[test]
    fn test_record_record_rejected() {
        record_record_rejected(RejectReason::ValueTooLong);
        let counter = RECORDS_REJECTED_TOTAL.with_label_values(&["value_too_long"]);
        assert!(counter.get() > 0.0);
    }

    #[test]
    fn test_gather_metrics() {
        record_cycle_outcome("not_stale");
        record_cycle_duration(Duration::from_millis(100));

        let result = gather_metrics();
        assert!(result.is_ok(), "Gathering metrics should succeed");

        let metrics_text = result.unwrap();
        assert!(
            metrics_text.contains("zonesync_cycles_total"),
            "Metrics should contain the cycle counter"
        );
    }
}
