//! The paginated fetch loop.

use candlesync_fetch::ExchangeClient;
use candlesync_store::{FloorTracker, StoreAdapter};
use candlesync_types::{Candle, DataFloor};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::normalize::{normalize, normalize_raw};
use crate::persist::persist;
use crate::{SyncConfig, SyncError, SyncSession};

/// Final disposition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The window was covered, or the exchange has nothing more to give.
    Success,
    /// Some data was persisted but the window was not fully covered.
    PartiallySaved,
    /// Nothing was persisted.
    Failed,
}

/// Why the pagination loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "at", rename_all = "snake_case")]
pub enum StopReason {
    /// The cursor reached the end of the window.
    RangeComplete,
    /// The exchange repeated its previous page.
    RemoteExhausted,
    /// A run of empty pages far enough in the past established a floor.
    DataFloorReached(DateTime<Utc>),
    /// A run of empty pages ended the window without establishing a floor.
    NoMoreData,
    /// The iteration cap was hit.
    IterationCap,
    /// The cancellation token fired.
    Cancelled,
    /// An exchange or store error ended the run.
    Error,
}

impl StopReason {
    /// Returns true for stops caused by an error or cancellation.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Error)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RangeComplete => f.write_str("range complete"),
            Self::RemoteExhausted => f.write_str("remote exhausted"),
            Self::DataFloorReached(at) => write!(f, "data floor reached at {}", at.to_rfc3339()),
            Self::NoMoreData => f.write_str("no more data"),
            Self::IterationCap => f.write_str("iteration cap"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// What [`PaginationExecutor::run`] hands back.
#[derive(Debug)]
pub struct PaginationResult {
    /// Normalized rows fetched after the last checkpoint, not yet persisted.
    pub records: Vec<Candle>,
    /// Disposition of the run so far.
    pub outcome: SyncOutcome,
    /// Why the loop stopped.
    pub stop: StopReason,
    /// Rows persisted by checkpoints during the run.
    pub rows_flushed: usize,
    /// The error that ended the run, if any.
    pub error: Option<SyncError>,
}

/// Walks a [`FetchWindow`](crate::FetchWindow) page by page.
///
/// Each iteration asks the exchange for one page starting at the session
/// cursor and classifies the answer:
///
/// - a page repeating the previous leading timestamp stops the run;
/// - a page reaching the window end is truncated and stops the run;
/// - any other non-empty page is buffered and moves the cursor past it;
/// - an empty page advances the cursor one interval, and a long enough run of
///   them stops the run, recording a floor when it began before the cutoff.
///
/// The buffer is checkpointed through [`persist`] every
/// `periodic_save_threshold` rows. On error or cancellation the buffer is
/// flushed before returning.
pub struct PaginationExecutor<'a, E: ?Sized, S: ?Sized> {
    exchange: &'a E,
    store: &'a S,
    floors: &'a FloorTracker,
    config: &'a SyncConfig,
    cancel: CancellationToken,
}

impl<E: ?Sized, S: ?Sized> std::fmt::Debug for PaginationExecutor<'_, E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationExecutor")
            .field("config", self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<'a, E, S> PaginationExecutor<'a, E, S>
where
    E: ExchangeClient + ?Sized,
    S: StoreAdapter + ?Sized,
{
    /// Creates an executor that is never cancelled.
    #[must_use]
    pub fn new(
        exchange: &'a E,
        store: &'a S,
        floors: &'a FloorTracker,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            exchange,
            store,
            floors,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop between iterations.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs the loop until a stop condition is met.
    pub async fn run(&self, session: &mut SyncSession) -> PaginationResult {
        let mut error = None;
        let stop = self.drive(session, &mut error).await;

        if stop.is_abort() {
            if !session.buffer.is_empty() {
                if let Err(e) = self.flush(session).await {
                    tracing::warn!(
                        target: "candlesync::executor",
                        series = %session.key(),
                        error = %e,
                        "best-effort flush failed"
                    );
                    error.get_or_insert(e);
                }
            }
            let outcome = if session.rows_flushed > 0 {
                SyncOutcome::PartiallySaved
            } else {
                SyncOutcome::Failed
            };
            return PaginationResult {
                records: normalize(std::mem::take(&mut session.buffer)),
                outcome,
                stop,
                rows_flushed: session.rows_flushed,
                error,
            };
        }

        PaginationResult {
            records: normalize(std::mem::take(&mut session.buffer)),
            outcome: self.clean_outcome(session, stop),
            stop,
            rows_flushed: session.rows_flushed,
            error,
        }
    }

    fn clean_outcome(&self, session: &SyncSession, stop: StopReason) -> SyncOutcome {
        if !matches!(stop, StopReason::RemoteExhausted | StopReason::IterationCap) {
            return SyncOutcome::Success;
        }
        let step = session.key().interval.duration();
        let good_enough = session.window.end - step - self.config.overlap_tolerance();
        let complete = session.last_fetched.is_some_and(|last| last >= good_enough);
        if complete {
            SyncOutcome::Success
        } else if session.rows_fetched > 0 {
            SyncOutcome::PartiallySaved
        } else {
            SyncOutcome::Failed
        }
    }

    async fn drive(&self, session: &mut SyncSession, error: &mut Option<SyncError>) -> StopReason {
        let key = session.key().clone();
        let step = key.interval.duration();
        let end = session.window.end;
        let limit = self.config.page_limit.max(1);
        let label = key.to_string();

        loop {
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            if session.cursor >= end {
                return StopReason::RangeComplete;
            }
            if session.iterations >= self.config.max_iterations {
                tracing::warn!(
                    target: "candlesync::executor",
                    series = %key,
                    iterations = session.iterations,
                    "iteration cap reached"
                );
                return StopReason::IterationCap;
            }

            if session.iterations > 0 && self.config.request_delay_ms > 0 {
                tokio::select! {
                    () = self.cancel.cancelled() => return StopReason::Cancelled,
                    () = tokio::time::sleep(self.config.request_delay()) => {}
                }
            }

            session.iterations += 1;
            let since = session.cursor;
            let page = self
                .config
                .retry
                .run_until_cancelled(&label, &self.cancel, || {
                    self.exchange
                        .fetch_candles(&key.symbol, key.interval, since, limit)
                })
                .await;

            let mut candles = match page {
                Ok(raws) => normalize_raw(&key, raws),
                Err(_) if self.cancel.is_cancelled() => return StopReason::Cancelled,
                Err(e) => {
                    tracing::warn!(
                        target: "candlesync::executor",
                        series = %key,
                        since = %since,
                        error = %e,
                        "exchange call failed"
                    );
                    *error = Some(e.into());
                    return StopReason::Error;
                }
            };

            let Some(leading) = candles.first().map(|c| c.timestamp) else {
                if let Some(stop) = self.on_empty(session, since).await {
                    return stop;
                }
                continue;
            };

            if session.previous_leading == Some(leading) {
                tracing::info!(
                    target: "candlesync::executor",
                    series = %key,
                    leading = %leading,
                    "exchange repeated its last page"
                );
                return StopReason::RemoteExhausted;
            }
            session.previous_leading = Some(leading);
            session.consecutive_empty = 0;
            session.first_empty = None;

            let in_range = candles.partition_point(|c| c.timestamp < end);
            let reached_end = in_range < candles.len();
            candles.truncate(in_range);

            if let Some(last) = candles.last().map(|c| c.timestamp) {
                if last < since {
                    return StopReason::RemoteExhausted;
                }
                session.last_fetched = Some(last);
                session.cursor = last + step;
            }
            session.rows_fetched += candles.len();
            session.buffer.extend(candles);

            tracing::debug!(
                target: "candlesync::executor",
                series = %key,
                since = %since,
                buffered = session.buffer.len(),
                "fetched page"
            );

            if session.buffer.len() >= self.config.periodic_save_threshold {
                if let Err(e) = self.flush(session).await {
                    *error = Some(e);
                    return StopReason::Error;
                }
            }

            if reached_end || session.cursor >= end {
                return StopReason::RangeComplete;
            }
        }
    }

    async fn on_empty(&self, session: &mut SyncSession, since: DateTime<Utc>) -> Option<StopReason> {
        session.consecutive_empty += 1;
        let first_empty = *session.first_empty.get_or_insert(since);

        if session.consecutive_empty >= self.config.max_consecutive_empty {
            if first_empty < self.config.floor_cutoff && !session.seen_data() {
                let floor = DataFloor::new(session.key().clone(), first_empty);
                if let Err(e) = self.floors.record(&floor).await {
                    tracing::warn!(
                        target: "candlesync::executor",
                        series = %floor.key,
                        error = %e,
                        "failed to record data floor"
                    );
                }
                return Some(StopReason::DataFloorReached(first_empty));
            }
            tracing::info!(
                target: "candlesync::executor",
                series = %session.key(),
                empties = session.consecutive_empty,
                first_empty = %first_empty,
                "no more data from exchange"
            );
            return Some(StopReason::NoMoreData);
        }

        session.cursor = since + session.key().interval.duration();
        (session.cursor >= session.window.end).then_some(StopReason::NoMoreData)
    }

    async fn flush(&self, session: &mut SyncSession) -> Result<usize, SyncError> {
        let batch = normalize(std::mem::take(&mut session.buffer));
        match persist(self.store, session.key(), &batch, self.config).await {
            Ok(report) => {
                session.rows_flushed += report.rows_written;
                tracing::info!(
                    target: "candlesync::executor",
                    series = %session.key(),
                    rows = report.rows_written,
                    total = session.rows_flushed,
                    "checkpoint flushed"
                );
                Ok(report.rows_written)
            }
            Err(e) => {
                session.buffer = batch;
                Err(e.into())
            }
        }
    }
}
