//! Persistence backends for the candlesync engine.
//!
//! - [`StoreAdapter`] - The storage seam the engine writes through
//! - [`CsvStore`] - One CSV file per symbol and interval
//! - [`SqliteStore`] - One relational table keyed by symbol, interval and time
//! - [`FloorTracker`] - Persisted data floors
//! - [`KeyLocks`] - Per-series writer serialization

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlesync/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod adapter;
mod csv;
mod floor;
mod fs;
mod locks;
mod sqlite;

pub use adapter::{MalformedRow, Result, StoreAdapter, StoreError, StoredSeries};
pub use csv::CsvStore;
pub use floor::FloorTracker;
pub use locks::KeyLocks;
pub use sqlite::SqliteStore;
