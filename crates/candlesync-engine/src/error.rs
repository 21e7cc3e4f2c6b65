//! Engine error types.

use candlesync_fetch::FetchError;
use candlesync_store::StoreError;
use candlesync_types::{PlanningError, SeriesKey};
use thiserror::Error;

/// A backend write failed; the series run is aborted.
#[derive(Error, Debug)]
#[error("Failed to persist {key}: {source}")]
pub struct PersistenceError {
    /// The series being written.
    pub key: SeriesKey,
    /// The underlying store error.
    #[source]
    pub source: StoreError,
}

impl PersistenceError {
    /// Wraps a store error for `key`.
    #[must_use]
    pub fn new(key: &SeriesKey, source: StoreError) -> Self {
        Self {
            key: key.clone(),
            source,
        }
    }
}

/// Errors that end a synchronization run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The requested range is malformed.
    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    /// The store could not be read.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A write through the persistence engine failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The exchange call failed after retries.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The run was cancelled.
    #[error("Synchronization cancelled")]
    Cancelled,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
