//! The storage seam shared by every backend.

use async_trait::async_trait;
use candlesync_types::{Candle, ColumnSet, SeriesCoverage, SeriesKey};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing persisted series.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error in '{path}': {source}")]
    Csv {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying CSV error.
        source: csv_async::Error,
    },

    /// A CSV file carries a header this store does not understand.
    #[error("Unrecognized header in '{path}': {header}")]
    UnknownHeader {
        /// The offending file.
        path: PathBuf,
        /// The header as found.
        header: String,
    },

    /// An append carries columns the stored series lacks.
    #[error("Column mismatch in '{path}': stored {stored:?}, incoming {incoming:?}")]
    ColumnMismatch {
        /// The series file.
        path: PathBuf,
        /// Layout of the stored series.
        stored: ColumnSet,
        /// Layout the incoming rows need.
        incoming: ColumnSet,
    },

    /// Relational backend failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to parse or serialize the data-floor file.
    #[error("Invalid floor file '{path}': {source}")]
    Json {
        /// The floor file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to determine the application data directory.
    #[error("Failed to determine application data directory")]
    NoDataDir,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A persisted row that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    /// Backend-specific position (CSV line, or the raw key for SQL rows).
    pub position: u64,
    /// What went wrong.
    pub reason: String,
}

/// A series as read back from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSeries {
    /// Decoded rows, in storage order.
    pub candles: Vec<Candle>,
    /// Column layout of the backend for this series.
    pub columns: ColumnSet,
    /// Rows that could not be decoded.
    pub malformed: Vec<MalformedRow>,
}

impl StoredSeries {
    /// An empty series with the plain OHLCV layout.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            candles: Vec::new(),
            columns: ColumnSet::Ohlcv,
            malformed: Vec::new(),
        }
    }

    /// Returns true if no rows were decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// A backend that persists candle series.
///
/// A successful write is visible in full to every later read, or not at all.
/// Implementations may assume that a single writer touches a given series at a
/// time; stores that cannot guarantee this internally serialize per key.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Returns the earliest persisted bucket open time, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn first_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>>;

    /// Returns the latest persisted bucket open time, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn last_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>>;

    /// Returns the persisted extent of a series, if any rows exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn coverage(&self, key: &SeriesKey) -> Result<Option<SeriesCoverage>> {
        let first = self.first_timestamp(key).await?;
        let last = self.last_timestamp(key).await?;
        Ok(first
            .zip(last)
            .map(|(first, last)| SeriesCoverage::new(key.clone(), first, last)))
    }

    /// Returns the column layout of an existing series, or `None` if the
    /// series has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn columns(&self, key: &SeriesKey) -> Result<Option<ColumnSet>>;

    /// Reads every persisted row of a series.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read. Undecodable rows are
    /// reported in [`StoredSeries::malformed`] instead.
    async fn read_series(&self, key: &SeriesKey) -> Result<StoredSeries>;

    /// Appends rows to an existing series.
    ///
    /// Callers pass rows sorted by timestamp. On failure the series is left as
    /// it was before the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn write_append(&self, key: &SeriesKey, candles: &[Candle]) -> Result<()>;

    /// Replaces a series with `candles`, using the given column layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the previous contents survive.
    async fn write_full(&self, key: &SeriesKey, candles: &[Candle], columns: ColumnSet)
    -> Result<()>;

    /// Returns true if appends resolve key conflicts inside the backend.
    ///
    /// Such backends accept rows overlapping the persisted tail.
    fn upserts(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: StoreAdapter + ?Sized> StoreAdapter for std::sync::Arc<T> {
    async fn first_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        (**self).first_timestamp(key).await
    }

    async fn last_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        (**self).last_timestamp(key).await
    }

    async fn coverage(&self, key: &SeriesKey) -> Result<Option<SeriesCoverage>> {
        (**self).coverage(key).await
    }

    async fn columns(&self, key: &SeriesKey) -> Result<Option<ColumnSet>> {
        (**self).columns(key).await
    }

    async fn read_series(&self, key: &SeriesKey) -> Result<StoredSeries> {
        (**self).read_series(key).await
    }

    async fn write_append(&self, key: &SeriesKey, candles: &[Candle]) -> Result<()> {
        (**self).write_append(key, candles).await
    }

    async fn write_full(
        &self,
        key: &SeriesKey,
        candles: &[Candle],
        columns: ColumnSet,
    ) -> Result<()> {
        (**self).write_full(key, candles, columns).await
    }

    fn upserts(&self) -> bool {
        (**self).upserts()
    }
}
