//! Exchange client contract.

use async_trait::async_trait;
use candlesync_types::{Interval, RawCandle};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors an exchange client can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The exchange throttled the request.
    #[error("Rate limited by exchange")]
    RateLimited {
        /// Server-suggested wait before the next attempt.
        retry_after: Option<Duration>,
    },

    /// Connection reset, timeout or a 5xx response.
    #[error("Transient network error: {0}")]
    Transient(String),

    /// The exchange rejected the request (bad symbol, bad parameters, ...).
    #[error("Exchange error: {0}")]
    Exchange(String),
}

impl FetchError {
    /// Returns true for rate-limit and transient network errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}

/// A paginated candle source.
///
/// Implementations return up to `limit` candles with open time at or after
/// `since`, in any order. An empty vector is the empty response. Calls must be
/// idempotent for identical `(symbol, interval, since)` inputs.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetches one page of candles.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classifying the failure.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError>;
}

#[async_trait]
impl<T: ExchangeClient + ?Sized> ExchangeClient for std::sync::Arc<T> {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError> {
        (**self).fetch_candles(symbol, interval, since, limit).await
    }
}
