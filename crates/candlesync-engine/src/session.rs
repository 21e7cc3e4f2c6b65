//! Per-run pagination state.

use candlesync_types::{Candle, SeriesKey};
use chrono::{DateTime, Utc};

use crate::FetchWindow;

/// Everything one pagination run accumulates.
///
/// A session is owned by exactly one run; nothing in it is shared between
/// series.
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub(crate) window: FetchWindow,
    pub(crate) cursor: DateTime<Utc>,
    pub(crate) buffer: Vec<Candle>,
    pub(crate) iterations: u32,
    pub(crate) consecutive_empty: u32,
    pub(crate) first_empty: Option<DateTime<Utc>>,
    pub(crate) previous_leading: Option<DateTime<Utc>>,
    pub(crate) last_fetched: Option<DateTime<Utc>>,
    pub(crate) rows_fetched: usize,
    pub(crate) rows_flushed: usize,
}

impl SyncSession {
    /// Starts a session at the beginning of `window`.
    #[must_use]
    pub const fn new(window: FetchWindow) -> Self {
        let cursor = window.start;
        Self {
            window,
            cursor,
            buffer: Vec::new(),
            iterations: 0,
            consecutive_empty: 0,
            first_empty: None,
            previous_leading: None,
            last_fetched: None,
            rows_fetched: 0,
            rows_flushed: 0,
        }
    }

    /// Returns the series.
    #[must_use]
    pub const fn key(&self) -> &SeriesKey {
        &self.window.key
    }

    /// Returns the window being walked.
    #[must_use]
    pub const fn window(&self) -> &FetchWindow {
        &self.window
    }

    /// Returns the next `since` to request.
    #[must_use]
    pub const fn cursor(&self) -> DateTime<Utc> {
        self.cursor
    }

    /// Returns the rows fetched but not yet flushed.
    #[must_use]
    pub fn buffered(&self) -> &[Candle] {
        &self.buffer
    }

    /// Returns the number of exchange calls made.
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Returns the open time of the latest row fetched in this run.
    #[must_use]
    pub const fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.last_fetched
    }

    /// Returns the number of in-window rows received from the exchange.
    #[must_use]
    pub const fn rows_fetched(&self) -> usize {
        self.rows_fetched
    }

    /// Returns the number of rows persisted by checkpoints in this run.
    #[must_use]
    pub const fn rows_flushed(&self) -> usize {
        self.rows_flushed
    }

    /// Returns true once any row has been received.
    #[must_use]
    pub const fn seen_data(&self) -> bool {
        self.previous_leading.is_some()
    }
}
