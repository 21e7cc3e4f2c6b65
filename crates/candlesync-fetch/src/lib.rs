//! Exchange boundary for the candlesync engine.
//!
//! This crate defines what the engine needs from a market-data source:
//!
//! - [`ExchangeClient`] - Paginated candle source trait
//! - [`FetchError`] - Classified transport and exchange failures
//! - [`RetryPolicy`] - Exponential backoff around exchange calls
//!
//! With the `test-utils` feature, the `testing` module provides in-memory
//! exchanges for driving the engine without a network.

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlesync/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::{ExchangeClient, FetchError};
pub use retry::RetryPolicy;
