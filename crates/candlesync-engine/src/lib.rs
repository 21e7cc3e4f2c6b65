//! Incremental OHLCV synchronization.
//!
//! - [`plan()`] - Narrow a requested range to what actually needs fetching
//! - [`PaginationExecutor`] - Walk a fetch window page by page
//! - [`normalize()`] - Sort and deduplicate candles
//! - [`persist()`] - Append, merge or rewrite a batch into a store
//! - [`validate()`] - Continuity and structural checks
//! - [`Synchronizer`] - All of the above, per series and across series

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlesync/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod executor;
mod normalize;
mod persist;
mod planner;
mod session;
mod sync;
mod validate;

pub use config::SyncConfig;
pub use error::{PersistenceError, Result, SyncError};
pub use executor::{PaginationExecutor, PaginationResult, StopReason, SyncOutcome};
pub use normalize::{merge_series, normalize, normalize_raw};
pub use persist::{PersistReport, WriteMode, persist};
pub use planner::{FetchWindow, Plan, SyncRequest, plan, plan_window};
pub use session::SyncSession;
pub use sync::{SyncReport, Synchronizer};
pub use validate::{
    GAP_FACTOR, Gap, Jump, MIN_COVERAGE_RATIO, RejectedRow, ValidationIssue, ValidationReport,
    ValidationWarning, find_jumps, screen, validate, validate_stored,
};
