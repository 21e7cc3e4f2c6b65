//! Incremental OHLCV market-data synchronization.
//!
//! This is a facade crate that re-exports functionality from the candlesync
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use candlesync_lib::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exchange = MyExchange::connect()?;
//!     let store = SqliteStore::open("candles.db").await?;
//!     let floors = FloorTracker::with_default_path().await?;
//!     let sync = Synchronizer::new(exchange, store, floors, SyncConfig::default());
//!
//!     let requests = ["BTCUSDT", "ETHUSDT"].map(|symbol| {
//!         SyncRequest::parse(symbol, Interval::Hour1, "2024-01-01T00:00:00Z", "2024-07-01T00:00:00Z")
//!     });
//!     for report in sync.sync_all(requests.into_iter().collect::<Result<Vec<_>, _>>()?).await {
//!         println!("{}: {:?}, {} rows", report.key, report.outcome, report.rows_written);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlesync/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use candlesync_types::*;

// Re-export the exchange seam
pub use candlesync_fetch::{ExchangeClient, FetchError, RetryPolicy};

/// Exchange seam and retry policy.
pub mod fetch {
    pub use candlesync_fetch::*;
}

// Re-export stores
pub use candlesync_store::{
    CsvStore, FloorTracker, KeyLocks, MalformedRow, SqliteStore, StoreAdapter, StoreError,
    StoredSeries,
};

// Re-export the engine
#[cfg(feature = "engine")]
pub use candlesync_engine::{
    FetchWindow, Gap, Jump, PaginationExecutor, PaginationResult, PersistReport,
    PersistenceError, Plan, RejectedRow, StopReason, SyncConfig, SyncError, SyncOutcome,
    SyncReport, SyncRequest, SyncSession, Synchronizer, ValidationIssue, ValidationReport,
    ValidationWarning, WriteMode, find_jumps, merge_series, normalize, normalize_raw, persist,
    plan, plan_window, screen, validate, validate_stored,
};

/// Prelude module for convenient imports.
///
/// ```
/// use candlesync_lib::prelude::*;
/// ```
pub mod prelude {
    pub use candlesync_types::{
        Candle, ColumnSet, DataFloor, Interval, PlanningError, RawCandle, SeriesCoverage,
        SeriesKey, TimeRange,
    };

    pub use candlesync_fetch::{ExchangeClient, FetchError, RetryPolicy};

    pub use candlesync_store::{CsvStore, FloorTracker, SqliteStore, StoreAdapter, StoreError};

    #[cfg(feature = "engine")]
    pub use candlesync_engine::{
        StopReason, SyncConfig, SyncError, SyncOutcome, SyncReport, SyncRequest, Synchronizer,
        ValidationReport,
    };
}
