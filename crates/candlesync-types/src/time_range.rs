//! Half-open UTC time ranges and instant normalization.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::{Interval, PlanningError};

/// A half-open range `[start, end)` of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// Start instant (inclusive).
    pub start: DateTime<Utc>,
    /// End instant (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a new range, validating that `start < end`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::EmptyRange`] if `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, PlanningError> {
        if start >= end {
            return Err(PlanningError::EmptyRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds with [`parse_utc_instant`].
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is naive or unparseable, or the range is empty.
    pub fn parse(start: &str, end: &str) -> Result<Self, PlanningError> {
        Self::new(parse_utc_instant(start)?, parse_utc_instant(end)?)
    }

    /// Returns the length of the range.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Returns true if the range contains the given instant.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Returns the number of whole buckets of `interval` that fit in the range.
    #[must_use]
    pub fn bucket_count(&self, interval: Interval) -> i64 {
        self.duration().num_seconds() / interval.seconds()
    }

    /// Returns an iterator over bucket open times, starting at `start`.
    pub fn buckets(&self, interval: Interval) -> BucketIterator {
        BucketIterator {
            current: self.start,
            end: self.end,
            step: interval.duration(),
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Iterator over the bucket open times of a [`TimeRange`].
#[derive(Debug, Clone)]
pub struct BucketIterator {
    current: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
}

impl Iterator for BucketIterator {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.end {
            return None;
        }

        let result = self.current;
        self.current += self.step;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.current >= self.end {
            return (0, Some(0));
        }
        let remaining = (self.end - self.current).num_seconds();
        let step = self.step.num_seconds().max(1);
        let buckets = usize::try_from((remaining + step - 1) / step).unwrap_or(usize::MAX);
        (buckets, Some(buckets))
    }
}

impl ExactSizeIterator for BucketIterator {}

/// Interprets a naive timestamp as UTC.
///
/// Sources that report wall-clock times without an offset must pass through
/// here before their instants are compared with anything else.
#[must_use]
pub fn to_utc_instant(naive: NaiveDateTime) -> DateTime<Utc> {
    naive.and_utc()
}

/// Parses an RFC 3339 instant and converts it to UTC.
///
/// # Errors
///
/// Returns [`PlanningError::NaiveTimestamp`] when the text is a valid date-time
/// without an offset, and [`PlanningError::UnparseableTimestamp`] otherwise.
pub fn parse_utc_instant(text: &str) -> Result<DateTime<Utc>, PlanningError> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive_formats = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
    let is_naive = naive_formats
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(text, fmt).is_ok())
        || chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok();

    if is_naive {
        Err(PlanningError::NaiveTimestamp(text.to_string()))
    } else {
        Err(PlanningError::UnparseableTimestamp(text.to_string()))
    }
}
