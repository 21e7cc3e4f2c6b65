//! Per-series orchestration: plan, fetch, persist, validate.

use candlesync_fetch::ExchangeClient;
use candlesync_store::{FloorTracker, StoreAdapter};
use candlesync_types::SeriesKey;
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use crate::executor::{PaginationExecutor, StopReason, SyncOutcome};
use crate::normalize::normalize;
use crate::persist::persist;
use crate::planner::{SyncRequest, plan};
use crate::validate::{ValidationReport, screen, validate_stored};
use crate::{Result, SyncConfig, SyncError, SyncSession};

/// What happened to one series.
#[derive(Debug)]
pub struct SyncReport {
    /// The series.
    pub key: SeriesKey,
    /// Final disposition.
    pub outcome: SyncOutcome,
    /// Rows handed to the backend during the run.
    pub rows_written: usize,
    /// Why pagination stopped, or `None` if nothing was fetched.
    pub stop_reason: Option<StopReason>,
    /// The error that ended or degraded the run.
    pub error: Option<SyncError>,
    /// Validation of the persisted series after the run.
    pub validation: Option<ValidationReport>,
    /// True if the persisted series was rewritten to fix validation issues.
    pub repaired: bool,
}

impl SyncReport {
    const fn new(key: SeriesKey) -> Self {
        Self {
            key,
            outcome: SyncOutcome::Failed,
            rows_written: 0,
            stop_reason: None,
            error: None,
            validation: None,
            repaired: false,
        }
    }

    /// Returns true if the run completed without degradation.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Success)
    }
}

/// Keeps local series in step with an exchange.
///
/// # Example
///
/// ```no_run
/// use candlesync_engine::{SyncConfig, SyncRequest, Synchronizer};
/// use candlesync_store::{FloorTracker, SqliteStore};
/// use candlesync_types::Interval;
/// # async fn run(exchange: impl candlesync_fetch::ExchangeClient) -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteStore::open("candles.db").await?;
/// let floors = FloorTracker::with_default_path().await?;
/// let sync = Synchronizer::new(exchange, store, floors, SyncConfig::default());
///
/// let request = SyncRequest::parse(
///     "BTCUSDT",
///     Interval::Hour1,
///     "2024-01-01T00:00:00Z",
///     "2024-02-01T00:00:00Z",
/// )?;
/// let report = sync.sync(&request).await;
/// println!("{:?}: {} rows", report.outcome, report.rows_written);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Synchronizer<E, S> {
    exchange: E,
    store: S,
    floors: FloorTracker,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl<E, S> Synchronizer<E, S>
where
    E: ExchangeClient,
    S: StoreAdapter,
{
    /// Creates a synchronizer.
    #[must_use]
    pub fn new(exchange: E, store: S, floors: FloorTracker, config: SyncConfig) -> Self {
        Self {
            exchange,
            store,
            floors,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop runs between pagination iterations.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the token that cancels every run of this synchronizer.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the exchange client.
    #[must_use]
    pub const fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Returns the store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the floor tracker.
    #[must_use]
    pub const fn floors(&self) -> &FloorTracker {
        &self.floors
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Brings one series up to date over the requested range.
    ///
    /// Never fails as a whole: errors are reported in the returned
    /// [`SyncReport`] together with whatever was saved before them.
    pub async fn sync(&self, request: &SyncRequest) -> SyncReport {
        let key = request.key.clone();
        let mut report = SyncReport::new(key.clone());

        if self.cancel.is_cancelled() {
            report.stop_reason = Some(StopReason::Cancelled);
            report.error = Some(SyncError::Cancelled);
            return report;
        }

        let window = match plan(&self.store, &self.floors, request, &self.config).await {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(target: "candlesync::sync", series = %key, error = %e, "planning failed");
                report.error = Some(e);
                return report;
            }
        };

        if !window.should_fetch {
            tracing::debug!(target: "candlesync::sync", series = %key, "range already covered");
            report.outcome = SyncOutcome::Success;
            return report;
        }

        let mut session = SyncSession::new(window);
        let result = PaginationExecutor::new(&self.exchange, &self.store, &self.floors, &self.config)
            .with_cancellation(self.cancel.clone())
            .run(&mut session)
            .await;

        report.stop_reason = Some(result.stop);
        report.outcome = result.outcome;
        report.rows_written = result.rows_flushed;
        report.error = result.error;

        if !result.records.is_empty() {
            match persist(&self.store, &key, &result.records, &self.config).await {
                Ok(persisted) => {
                    report.rows_written += persisted.rows_written;
                    if report.outcome == SyncOutcome::Failed && persisted.is_written() {
                        report.outcome = SyncOutcome::PartiallySaved;
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "candlesync::sync", series = %key, error = %e, "failed to persist tail");
                    report.outcome = if report.rows_written > 0 {
                        SyncOutcome::PartiallySaved
                    } else {
                        SyncOutcome::Failed
                    };
                    report.error.get_or_insert(e.into());
                }
            }
        }

        if report.rows_written > 0 {
            self.check_and_repair(&key, &mut report).await;
        }

        tracing::info!(
            target: "candlesync::sync",
            series = %key,
            outcome = ?report.outcome,
            stop = ?report.stop_reason,
            rows = report.rows_written,
            repaired = report.repaired,
            "sync finished"
        );
        report
    }

    /// Synchronizes several series concurrently.
    ///
    /// At most `max_concurrent_series` runs are in flight. A failing series
    /// does not affect the others. Reports come back in completion order.
    pub async fn sync_all(&self, requests: impl IntoIterator<Item = SyncRequest>) -> Vec<SyncReport> {
        let limit = self.config.max_concurrent_series.max(1);
        stream::iter(requests)
            .map(|request| async move { self.sync(&request).await })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    /// Validates the persisted series for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the series cannot be read.
    pub async fn validate_series(&self, key: &SeriesKey) -> Result<ValidationReport> {
        let stored = self.store.read_series(key).await?;
        Ok(validate_stored(&stored, key.interval))
    }

    /// Rewrites the persisted series for `key` sorted, deduplicated and
    /// without undecodable or broken rows. Returns the number of rows kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the series cannot be read or rewritten.
    pub async fn repair(&self, key: &SeriesKey) -> Result<usize> {
        let stored = self.store.read_series(key).await?;
        if stored.is_empty() && stored.malformed.is_empty() {
            return Ok(0);
        }
        let (accepted, rejected) = screen(&stored.candles);
        let rows = normalize(accepted);
        tracing::warn!(
            target: "candlesync::sync",
            series = %key,
            kept = rows.len(),
            rejected = rejected.len(),
            malformed = stored.malformed.len(),
            "repairing stored series"
        );
        self.store
            .write_full(key, &rows, stored.columns)
            .await
            .map_err(|e| crate::PersistenceError::new(key, e))?;
        Ok(rows.len())
    }

    async fn check_and_repair(&self, key: &SeriesKey, report: &mut SyncReport) {
        let validation = match self.validate_series(key).await {
            Ok(validation) => validation,
            Err(e) => {
                tracing::warn!(target: "candlesync::sync", series = %key, error = %e, "validation failed");
                report.error.get_or_insert(e);
                return;
            }
        };

        if !validation.needs_repair() {
            report.validation = Some(validation);
            return;
        }

        match self.repair(key).await {
            Ok(_) => {
                report.repaired = true;
                match self.validate_series(key).await {
                    Ok(after) => report.validation = Some(after),
                    Err(e) => {
                        report.validation = Some(validation);
                        report.error.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(target: "candlesync::sync", series = %key, error = %e, "repair failed");
                report.validation = Some(validation);
                report.error.get_or_insert(e);
            }
        }
    }
}
