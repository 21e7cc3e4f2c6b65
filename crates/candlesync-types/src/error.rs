//! Error types shared across candlesync crates.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for planning operations.
pub type Result<T> = std::result::Result<T, PlanningError>;

/// Malformed time-range input, detected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    /// The requested range contains no instants.
    #[error("Invalid time range: {start} >= {end}")]
    EmptyRange {
        /// The requested start.
        start: DateTime<Utc>,
        /// The requested end.
        end: DateTime<Utc>,
    },

    /// A textual instant carried no UTC offset.
    #[error("Timestamp '{0}' has no UTC offset; normalize naive timestamps before planning")]
    NaiveTimestamp(String),

    /// A textual instant could not be parsed at all.
    #[error("Unparseable timestamp '{0}'")]
    UnparseableTimestamp(String),
}
