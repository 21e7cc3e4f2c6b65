//! Core types for the candlesync OHLCV synchronization engine.
//!
//! This crate provides the fundamental data structures used throughout candlesync:
//!
//! - [`Candle`] - A normalized OHLCV record with optional funding rate
//! - [`RawCandle`] - A candle as returned by an exchange, before normalization
//! - [`Interval`] - Nominal bucket width of a series
//! - [`SeriesKey`] - A symbol at an interval
//! - [`SeriesCoverage`] - Locally persisted extent of a series
//! - [`DataFloor`] - Earliest instant the exchange is known to have data for
//! - [`TimeRange`] - Half-open UTC range for planning and fetching

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlesync/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod candle;
mod error;
mod interval;
mod series;
mod time_range;

pub use candle::{Candle, CandleDefect, ColumnSet, RawCandle};
pub use error::{PlanningError, Result};
pub use interval::{Interval, IntervalParseError};
pub use series::{DataFloor, SeriesCoverage, SeriesKey};
pub use time_range::{BucketIterator, TimeRange, parse_utc_instant, to_utc_instant};
