//! Engine configuration.

use candlesync_fetch::RetryPolicy;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 2021-01-01T00:00:00Z.
const DEFAULT_FLOOR_CUTOFF_SECS: i64 = 1_609_459_200;

/// Tuning knobs for planning, pagination and persistence.
///
/// Every field has a default, so a partial document deserializes into a
/// complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Slack subtracted from gap comparisons, in minutes.
    pub overlap_tolerance_minutes: i64,
    /// Buffered rows that trigger a checkpoint flush.
    pub periodic_save_threshold: usize,
    /// Consecutive empty pages before the executor gives up.
    pub max_consecutive_empty: u32,
    /// Hard cap on exchange calls per window.
    pub max_iterations: u32,
    /// Backfill gaps larger than this are taken to mean the exchange has no
    /// earlier data.
    pub max_historical_gap_days: i64,
    /// Candles requested per page.
    pub page_limit: usize,
    /// Pause between consecutive exchange calls (in milliseconds).
    pub request_delay_ms: u64,
    /// Empty pages before this instant may establish a data floor.
    pub floor_cutoff: DateTime<Utc>,
    /// Retry policy for exchange calls.
    pub retry: RetryPolicy,
    /// Close-to-close relative change above which a row is logged as a jump.
    pub jump_warn_ratio: f64,
    /// Series synchronized at once by `sync_all`.
    pub max_concurrent_series: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            overlap_tolerance_minutes: 5,
            periodic_save_threshold: 10_000,
            max_consecutive_empty: 30,
            max_iterations: 10_000,
            max_historical_gap_days: 730,
            page_limit: 1000,
            request_delay_ms: 200,
            floor_cutoff: DateTime::from_timestamp(DEFAULT_FLOOR_CUTOFF_SECS, 0)
                .unwrap_or(DateTime::UNIX_EPOCH),
            retry: RetryPolicy::default(),
            jump_warn_ratio: 0.5,
            max_concurrent_series: 4,
        }
    }
}

impl SyncConfig {
    /// Returns the overlap tolerance.
    #[must_use]
    pub fn overlap_tolerance(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.overlap_tolerance_minutes).unwrap_or(TimeDelta::MAX)
    }

    /// Returns the historical-gap threshold.
    #[must_use]
    pub fn max_historical_gap(&self) -> TimeDelta {
        TimeDelta::try_days(self.max_historical_gap_days).unwrap_or(TimeDelta::MAX)
    }

    /// Returns the pause between exchange calls.
    #[must_use]
    pub const fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Sets the overlap tolerance in minutes.
    #[must_use]
    pub const fn with_overlap_tolerance_minutes(mut self, minutes: i64) -> Self {
        self.overlap_tolerance_minutes = minutes;
        self
    }

    /// Sets the checkpoint threshold.
    #[must_use]
    pub const fn with_periodic_save_threshold(mut self, rows: usize) -> Self {
        self.periodic_save_threshold = rows;
        self
    }

    /// Sets the consecutive-empty limit.
    #[must_use]
    pub const fn with_max_consecutive_empty(mut self, count: u32) -> Self {
        self.max_consecutive_empty = count;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, count: u32) -> Self {
        self.max_iterations = count;
        self
    }

    /// Sets the historical-gap threshold in days.
    #[must_use]
    pub const fn with_max_historical_gap_days(mut self, days: i64) -> Self {
        self.max_historical_gap_days = days;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit;
        self
    }

    /// Sets the pause between exchange calls.
    #[must_use]
    pub const fn with_request_delay_ms(mut self, millis: u64) -> Self {
        self.request_delay_ms = millis;
        self
    }

    /// Sets the floor cutoff.
    #[must_use]
    pub const fn with_floor_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.floor_cutoff = cutoff;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the concurrent series limit.
    #[must_use]
    pub const fn with_max_concurrent_series(mut self, count: usize) -> Self {
        self.max_concurrent_series = count;
        self
    }
}
