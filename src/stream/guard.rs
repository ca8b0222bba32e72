//! Retry and burst-smoothing guard
//!
//! The guard is advisory. A request that finds another one in flight waits
//! `in_flight_wait` once and then proceeds regardless; nothing is queued or
//! rejected. Every dispatch is spaced at least `min_spacing` after the
//! previous one. Transient provider errors are retried with exponential
//! backoff; anything else is returned immediately.

use crate::config::GuardConfig;
use crate::error::{AppError, AppResult, ProviderError};
use crate::metrics::Metrics;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Calculate exponential backoff with overflow protection
///
/// `base * 2^(attempt-1)`, capped at `max_backoff_ms`. Attempts are 1-indexed.
///
/// With base=1000ms, cap=8000ms:
/// - Attempt 1: 1000ms
/// - Attempt 2: 2000ms
/// - Attempt 3: 4000ms
/// - Attempt 4+: 8000ms
pub fn calculate_backoff(settings: &GuardConfig, attempt: usize) -> u64 {
    let exponent = u32::try_from(attempt).unwrap_or(u32::MAX).saturating_sub(1);
    settings
        .base_backoff_ms
        .saturating_mul(2_u64.saturating_pow(exponent))
        .min(settings.max_backoff_ms)
}

/// Marks a request as in flight until dropped
#[must_use]
pub struct InFlightPermit<'a> {
    guard: &'a RequestGuard,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Process-wide advisory guard shared by all requests of a generator
pub struct RequestGuard {
    settings: GuardConfig,
    in_flight: AtomicUsize,
    last_dispatch: Mutex<Option<Instant>>,
    metrics: Option<Metrics>,
}

impl RequestGuard {
    pub fn new(settings: GuardConfig) -> Self {
        Self {
            settings,
            in_flight: AtomicUsize::new(0),
            last_dispatch: Mutex::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &GuardConfig {
        &self.settings
    }

    /// Number of requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Enter the guard
    ///
    /// Waits once if another request is in flight, then proceeds. This is
    /// not mutual exclusion: two requests can hold permits at the same time.
    pub async fn admit(&self) -> InFlightPermit<'_> {
        if self.in_flight() > 0 {
            tracing::debug!(
                in_flight = self.in_flight(),
                wait_ms = self.settings.in_flight_wait_ms,
                "Another request in flight, delaying"
            );
            tokio::time::sleep(self.settings.in_flight_wait()).await;
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightPermit { guard: self }
    }

    /// Reserve the next dispatch slot and sleep until it arrives
    async fn wait_for_spacing(&self) {
        let wait = {
            let mut last = self
                .last_dispatch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let slot = match *last {
                Some(previous) => (previous + self.settings.min_spacing()).max(now),
                None => now,
            };
            *last = Some(slot);
            slot - now
        };

        if wait > Duration::ZERO {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Spacing dispatch");
            tokio::time::sleep(wait).await;
        }
    }

    /// Run `operation` with retries on transient errors
    ///
    /// `operation` receives the 1-indexed attempt number. Fatal errors come
    /// back as [`AppError::Provider`]; exhausting every attempt on transient
    /// errors yields [`AppError::Overloaded`]. Cancellation cuts a backoff
    /// short; the next attempt then observes the token and returns early.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> AppResult<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.wait_for_spacing().await;

            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, max_attempts, "Provider call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if let Some(metrics) = &self.metrics {
                metrics.provider_error(error.kind());
            }

            if !error.is_transient() {
                tracing::error!(
                    attempt,
                    max_attempts,
                    error = %error,
                    "Fatal provider error, not retrying"
                );
                return Err(AppError::Provider(error));
            }

            if attempt == max_attempts {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %error,
                    "Transient provider error on final attempt"
                );
                break;
            }

            let backoff_ms = calculate_backoff(&self.settings, attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                backoff_ms,
                error = %error,
                "Transient provider error, retrying after backoff"
            );
            if let Some(metrics) = &self.metrics {
                metrics.retry();
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(attempt, "Backoff interrupted by cancellation");
                }
                _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
            }
        }

        Err(AppError::Overloaded {
            attempts: max_attempts,
        })
    }
}
