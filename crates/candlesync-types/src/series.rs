//! Series identity, coverage and data floors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Interval;

/// Identifies one candle series: a symbol at a given interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Instrument symbol.
    pub symbol: String,
    /// Bucket width.
    pub interval: Interval,
}

impl SeriesKey {
    /// Creates a new series key.
    #[must_use]
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

/// Locally persisted extent of a series.
///
/// Derived on demand from the backend as the min/max persisted timestamps;
/// never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesCoverage {
    /// The series.
    pub key: SeriesKey,
    /// Earliest persisted bucket.
    pub first_timestamp: DateTime<Utc>,
    /// Latest persisted bucket.
    pub last_timestamp: DateTime<Utc>,
}

impl SeriesCoverage {
    /// Creates a coverage record.
    #[must_use]
    pub const fn new(
        key: SeriesKey,
        first_timestamp: DateTime<Utc>,
        last_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            first_timestamp,
            last_timestamp,
        }
    }

    /// Returns true if persisted buckets reach from `start` up to the bucket
    /// ending at `end` (exclusive).
    #[must_use]
    pub fn spans(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.first_timestamp <= start
            && self.last_timestamp + self.key.interval.duration() >= end
    }
}

/// The earliest instant for which the exchange is known to have data.
///
/// Requests for earlier history are futile and are clamped to this floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFloor {
    /// The series.
    pub key: SeriesKey,
    /// No data exists on the exchange before this instant.
    pub earliest_known_timestamp: DateTime<Utc>,
}

impl DataFloor {
    /// Creates a data floor record.
    #[must_use]
    pub const fn new(key: SeriesKey, earliest_known_timestamp: DateTime<Utc>) -> Self {
        Self {
            key,
            earliest_known_timestamp,
        }
    }
}
