//! Structural screening and continuity validation of candle series.

use candlesync_store::{MalformedRow, StoredSeries};
use candlesync_types::{Candle, CandleDefect, Interval};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coverage below this ratio turns gap warnings into issues.
pub const MIN_COVERAGE_RATIO: f64 = 0.8;

/// Gaps wider than this many intervals are reported.
pub const GAP_FACTOR: i32 = 2;

/// A stretch of missing buckets between two persisted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    /// Last row before the gap.
    pub after: DateTime<Utc>,
    /// First row after the gap.
    pub before: DateTime<Utc>,
    /// Number of buckets missing between the two.
    pub missing: i64,
}

/// A finding that does not invalidate the series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Missing buckets in an otherwise well-covered series.
    Gap(Gap),
}

/// A finding that invalidates the series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// A stored row could not be decoded (unparseable timestamp or field).
    MalformedRow {
        /// Backend-specific row position.
        position: u64,
        /// Decoder message.
        reason: String,
    },
    /// A timestamp appears more than once.
    DuplicateTimestamp {
        /// The repeated timestamp.
        timestamp: DateTime<Utc>,
    },
    /// A row is earlier than the one before it.
    OutOfOrder {
        /// The offending row.
        timestamp: DateTime<Utc>,
        /// The row preceding it.
        previous: DateTime<Utc>,
    },
    /// A row breaks an OHLC or volume invariant.
    Defect {
        /// The offending row.
        timestamp: DateTime<Utc>,
        /// What is wrong with it.
        defect: CandleDefect,
    },
    /// Missing buckets in a series whose coverage is too low.
    SparseGap {
        /// The gap.
        gap: Gap,
        /// Coverage ratio of the whole series.
        coverage_ratio: f64,
    },
}

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// False if and only if `issues` is non-empty.
    pub valid: bool,
    /// Non-fatal findings.
    pub warnings: Vec<ValidationWarning>,
    /// Fatal findings.
    pub issues: Vec<ValidationIssue>,
    /// Rows present divided by buckets expected between the first and last row.
    pub coverage_ratio: f64,
}

impl ValidationReport {
    fn from_findings(
        warnings: Vec<ValidationWarning>,
        issues: Vec<ValidationIssue>,
        coverage_ratio: f64,
    ) -> Self {
        Self {
            valid: issues.is_empty(),
            warnings,
            issues,
            coverage_ratio,
        }
    }

    /// Returns true if a rewrite of the series would fix some issue:
    /// duplicates, ordering, or rows that cannot be decoded or are broken.
    #[must_use]
    pub fn needs_repair(&self) -> bool {
        self.issues.iter().any(|issue| {
            matches!(
                issue,
                ValidationIssue::DuplicateTimestamp { .. }
                    | ValidationIssue::OutOfOrder { .. }
                    | ValidationIssue::MalformedRow { .. }
                    | ValidationIssue::Defect { .. }
            )
        })
    }

    /// Returns the gaps found, whether reported as warnings or issues.
    #[must_use]
    pub fn gaps(&self) -> Vec<Gap> {
        let warned = self.warnings.iter().map(|w| match w {
            ValidationWarning::Gap(gap) => *gap,
        });
        let failed = self.issues.iter().filter_map(|i| match i {
            ValidationIssue::SparseGap { gap, .. } => Some(*gap),
            _ => None,
        });
        warned.chain(failed).collect()
    }
}

/// Checks a series for duplicates, ordering, structural defects and gaps.
///
/// The series is examined as given; rows are not expected to be sorted.
#[must_use]
pub fn validate(series: &[Candle], interval: Interval) -> ValidationReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for pair in series.windows(2) {
        let (prev, curr) = (pair[0].timestamp, pair[1].timestamp);
        if curr < prev {
            issues.push(ValidationIssue::OutOfOrder {
                timestamp: curr,
                previous: prev,
            });
        }
    }

    for candle in series {
        if let Some(defect) = candle.defect() {
            issues.push(ValidationIssue::Defect {
                timestamp: candle.timestamp,
                defect,
            });
        }
    }

    let mut times: Vec<DateTime<Utc>> = series.iter().map(|c| c.timestamp).collect();
    times.sort_unstable();
    for pair in times.windows(2) {
        if pair[0] == pair[1] {
            issues.push(ValidationIssue::DuplicateTimestamp { timestamp: pair[1] });
        }
    }
    times.dedup();

    let step = interval.duration();
    let coverage_ratio = match (times.first(), times.last()) {
        (Some(first), Some(last)) => {
            let expected = (*last - *first).num_seconds() / interval.seconds() + 1;
            times.len() as f64 / expected.max(1) as f64
        }
        _ => 1.0,
    };

    for pair in times.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > step * GAP_FACTOR {
            let gap = Gap {
                after: pair[0],
                before: pair[1],
                missing: delta.num_seconds() / interval.seconds() - 1,
            };
            if coverage_ratio < MIN_COVERAGE_RATIO {
                issues.push(ValidationIssue::SparseGap {
                    gap,
                    coverage_ratio,
                });
            } else {
                warnings.push(ValidationWarning::Gap(gap));
            }
        }
    }

    ValidationReport::from_findings(warnings, issues, coverage_ratio)
}

/// Validates a series read back from a store, including rows the store could
/// not decode.
#[must_use]
pub fn validate_stored(stored: &StoredSeries, interval: Interval) -> ValidationReport {
    let mut report = validate(&stored.candles, interval);
    report.issues.extend(
        stored
            .malformed
            .iter()
            .map(|MalformedRow { position, reason }| ValidationIssue::MalformedRow {
                position: *position,
                reason: reason.clone(),
            }),
    );
    report.valid = report.issues.is_empty();
    report
}

/// A row rejected by [`screen`].
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// The rejected candle.
    pub candle: Candle,
    /// Why it was rejected.
    pub defect: CandleDefect,
}

/// Splits a batch into well-formed rows and rejected ones.
#[must_use]
pub fn screen(candles: &[Candle]) -> (Vec<Candle>, Vec<RejectedRow>) {
    let mut accepted = Vec::with_capacity(candles.len());
    let mut rejected = Vec::new();
    for candle in candles {
        match candle.defect() {
            None => accepted.push(candle.clone()),
            Some(defect) => rejected.push(RejectedRow {
                candle: candle.clone(),
                defect,
            }),
        }
    }
    (accepted, rejected)
}

/// A suspicious close-to-close move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jump {
    /// The row where the move lands.
    pub timestamp: DateTime<Utc>,
    /// Close of the preceding row.
    pub previous_close: f64,
    /// Close of this row.
    pub close: f64,
}

impl Jump {
    /// Relative change from the previous close.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        (self.close / self.previous_close - 1.0).abs()
    }
}

/// Finds consecutive rows whose close moves by more than `max_ratio`.
///
/// Expects a normalized series.
#[must_use]
pub fn find_jumps(series: &[Candle], max_ratio: f64) -> Vec<Jump> {
    series
        .windows(2)
        .map(|pair| Jump {
            timestamp: pair[1].timestamp,
            previous_close: pair[0].close,
            close: pair[1].close,
        })
        .filter(|jump| jump.previous_close > 0.0 && jump.ratio() > max_ratio)
        .collect()
}
