// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for the snapshot fetch.
//!
//! Transient HTTP failures (connect errors, 429, 5xx) are retried with
//! exponential backoff and jitter; permanent failures (4xx, undecodable
//! bodies) fail immediately so a broken upstream surfaces fast.

use std::time::{Duration, Instant};

use rand::RngExt;
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use crate::errors::FetchError;

/// Initial retry interval (250ms)
const INITIAL_INTERVAL_MILLIS: u64 = 250;

/// Maximum interval between retries (10 seconds)
const MAX_INTERVAL_SECS: u64 = 10;

/// Maximum total time to spend retrying (90 seconds)
const MAX_ELAPSED_TIME_SECS: u64 = 90;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff with jitter.
pub struct ExponentialBackoff {
    current_interval: Duration,
    max_interval: Duration,
    max_elapsed_time: Duration,
    multiplier: f64,
    randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new() -> Self {
        Self {
            current_interval: Duration::from_millis(INITIAL_INTERVAL_MILLIS),
            max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
            max_elapsed_time: Duration::from_secs(MAX_ELAPSED_TIME_SECS),
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
            start_time: Instant::now(),
        }
    }

    /// Next backoff interval, or `None` once the total budget is exhausted.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.start_time.elapsed() >= self.max_elapsed_time {
            return None;
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let mut rng = rand::rng();
        let jittered = rng.random_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Default backoff configuration for snapshot fetches.
#[must_use]
pub fn fetch_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new()
}

/// Determine if an HTTP status code indicates a transient error.
///
/// Retryable: 429, 500, 502, 503, 504. Everything else fails immediately.
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Determine if a fetch error is worth retrying.
///
/// Transport-level request failures and retryable statuses are transient;
/// 4xx responses and decode failures are not.
#[must_use]
pub fn is_retryable_fetch(err: &FetchError) -> bool {
    match err {
        FetchError::Request { .. } => true,
        FetchError::Status { status, .. } => StatusCode::from_u16(*status)
            .map(is_retryable_http_status)
            .unwrap_or(false),
        FetchError::Decode { .. } => false,
    }
}

/// Run an HTTP operation, retrying transient failures with backoff.
///
/// # Errors
///
/// Returns the last error when a non-retryable failure occurs or the retry
/// budget is exhausted.
pub async fn retry_http<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let mut backoff = fetch_backoff();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_fetch(&e) {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "non-retryable error, failing immediately"
                    );
                    return Err(e);
                }

                match backoff.next_backoff() {
                    Some(duration) => {
                        warn!(
                            operation = operation_name,
                            attempt,
                            retry_after = ?duration,
                            error = %e,
                            "retryable error, will retry"
                        );
                        tokio::time::sleep(duration).await;
                    }
                    None => {
                        error!(
                            operation = operation_name,
                            attempt,
                            error = %e,
                            "backoff exhausted, giving up"
                        );
                        return Err(e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
