//! Retry policy applied at the exchange client boundary.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::FetchError;

/// Exponential backoff with a bounded number of attempts.
///
/// Only errors for which [`FetchError::is_retryable`] holds are retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first failure.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Runs `operation`, retrying retryable failures with backoff.
    ///
    /// `label` is only used for logging.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once the
    /// retry budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        self.run_until_cancelled(label, &CancellationToken::new(), operation)
            .await
    }

    /// Like [`run`](Self::run), but gives up as soon as `cancel` fires while
    /// waiting out a backoff delay.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, the last error once the retry
    /// budget is spent, or the pending error if cancelled during a backoff.
    pub async fn run_until_cancelled<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempts = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempts < self.max_retries => {
                    attempts += 1;
                    let mut delay = self.backoff_delay(attempts);
                    if let FetchError::RateLimited {
                        retry_after: Some(hint),
                    } = &e
                    {
                        delay = delay.max(*hint);
                    }
                    tracing::warn!(
                        target: "candlesync::fetch",
                        label,
                        attempt = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying exchange call"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(e),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Calculates the backoff delay with exponential growth and jitter.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        // base_delay * 2^attempt, capped
        let exp_delay = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));
        let capped_delay = exp_delay.min(self.max_delay_ms);

        // Deterministic ±25% jitter keyed on the attempt number
        let jitter_range = capped_delay / 4;
        let final_delay = if jitter_range > 0 {
            let offset = (u64::from(attempt) * 17) % (jitter_range * 2);
            (capped_delay + offset).saturating_sub(jitter_range)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay)
    }
}
