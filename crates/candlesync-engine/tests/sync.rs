//! End-to-end synchronization scenarios against in-memory exchanges.

use approx::assert_relative_eq;
use async_trait::async_trait;
use candlesync_engine::{
    StopReason, SyncConfig, SyncError, SyncOutcome, SyncRequest, Synchronizer, plan,
};
use candlesync_fetch::testing::{HistoricalExchange, ScriptedExchange, synthetic_candles};
use candlesync_fetch::{ExchangeClient, FetchError, RetryPolicy};
use candlesync_store::{CsvStore, FloorTracker, SqliteStore, StoreAdapter};
use candlesync_types::{Interval, RawCandle, SeriesKey, TimeRange};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn config() -> SyncConfig {
    SyncConfig::default()
        .with_request_delay_ms(0)
        .with_retry(RetryPolicy::none())
}

fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn jan_first() -> TimeRange {
    TimeRange::new(utc(2024, 1, 1), utc(2024, 1, 2)).unwrap()
}

async fn floors(dir: &TempDir) -> FloorTracker {
    FloorTracker::load(dir.path().join("floors.json")).await.unwrap()
}

#[tokio::test]
async fn test_one_day_of_minutes_in_two_pages() {
    let dir = TempDir::new().unwrap();
    let exchange = HistoricalExchange::new(synthetic_candles(jan_first(), Interval::Minute1, 100.0));
    let store = SqliteStore::in_memory().await.unwrap();
    let sync = Synchronizer::new(exchange, store, floors(&dir).await, config().with_page_limit(720));
    let key = SeriesKey::new("BTCUSDT", Interval::Minute1);

    let report = sync.sync(&SyncRequest::new(key.clone(), jan_first())).await;

    assert_eq!(report.outcome, SyncOutcome::Success);
    assert_eq!(report.stop_reason, Some(StopReason::RangeComplete));
    assert_eq!(report.rows_written, 1440);
    assert_eq!(sync.exchange().call_count(), 2);

    let validation = report.validation.unwrap();
    assert!(validation.valid);
    assert!(validation.warnings.is_empty());
    assert_relative_eq!(validation.coverage_ratio, 1.0);

    let stored = sync.store().read_series(&key).await.unwrap();
    assert_eq!(stored.candles.len(), 1440);
    assert_eq!(stored.candles[0].timestamp, utc(2024, 1, 1));
}

#[tokio::test]
async fn test_repeated_first_page_keeps_only_that_page() {
    let dir = TempDir::new().unwrap();
    let first_half = TimeRange::new(utc(2024, 1, 1), utc(2024, 1, 1) + TimeDelta::hours(12)).unwrap();
    let page = synthetic_candles(first_half, Interval::Minute1, 100.0);
    let exchange = ScriptedExchange::new([Ok(page.clone()), Ok(page)]);
    let store = SqliteStore::in_memory().await.unwrap();
    let sync = Synchronizer::new(exchange, store, floors(&dir).await, config().with_page_limit(720));
    let key = SeriesKey::new("BTCUSDT", Interval::Minute1);

    let report = sync.sync(&SyncRequest::new(key.clone(), jan_first())).await;

    assert_eq!(report.stop_reason, Some(StopReason::RemoteExhausted));
    assert_eq!(report.outcome, SyncOutcome::PartiallySaved);
    assert_eq!(report.rows_written, 720);
    assert_eq!(sync.exchange().call_count(), 2);
    assert_eq!(
        sync.store().last_timestamp(&key).await.unwrap(),
        Some(utc(2024, 1, 1) + TimeDelta::minutes(719))
    );
}

#[tokio::test]
async fn test_old_empty_run_records_floor_and_later_plans_clamp() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();
    let cfg = config();
    let sync = Synchronizer::new(ScriptedExchange::always_empty(), store, floors(&dir).await, cfg.clone());
    let key = SeriesKey::new("NEWCOIN", Interval::Hour1);
    let start = utc(2019, 3, 1);

    let request = SyncRequest::new(key.clone(), TimeRange::new(start, utc(2019, 6, 1)).unwrap());
    let report = sync.sync(&request).await;

    assert_eq!(report.stop_reason, Some(StopReason::DataFloorReached(start)));
    assert_eq!(sync.exchange().call_count(), 30);
    assert_eq!(
        sync.floors().get(&key).await.map(|f| f.earliest_known_timestamp),
        Some(start)
    );

    // The floor survives a reload and clamps any later request.
    let reloaded = FloorTracker::load(sync.floors().path()).await.unwrap();
    let later = SyncRequest::new(key, TimeRange::new(utc(2017, 1, 1), utc(2020, 1, 1)).unwrap());
    let window = plan(sync.store(), &reloaded, &later, &cfg).await.unwrap();
    assert!(window.should_fetch);
    assert_eq!(window.start, start);
}

#[tokio::test]
async fn test_transport_error_after_checkpoint_is_partial() {
    let dir = TempDir::new().unwrap();
    let exchange = HistoricalExchange::new(synthetic_candles(jan_first(), Interval::Minute1, 100.0))
        .with_failure_on_call(2, FetchError::Exchange("503 service unavailable".into()));
    let store = CsvStore::new(dir.path().join("csv"));
    let cfg = config().with_page_limit(100).with_periodic_save_threshold(150);
    let sync = Synchronizer::new(exchange, store, floors(&dir).await, cfg);
    let key = SeriesKey::new("BTCUSDT", Interval::Minute1);

    let report = sync.sync(&SyncRequest::new(key.clone(), jan_first())).await;

    assert_eq!(report.stop_reason, Some(StopReason::Error));
    assert_eq!(report.outcome, SyncOutcome::PartiallySaved);
    assert!(matches!(report.error, Some(SyncError::Fetch(FetchError::Exchange(_)))));
    assert_eq!(report.rows_written, 200);
    assert!(report.validation.is_some_and(|v| v.valid));

    // A second run resumes from the persisted tail.
    let resumed = sync.sync(&SyncRequest::new(key.clone(), jan_first())).await;
    assert_eq!(resumed.outcome, SyncOutcome::Success);
    let stored = sync.store().read_series(&key).await.unwrap();
    assert_eq!(stored.candles.len(), 1440);
}

/// Cancels a token once `after` calls have been answered.
struct CancelAfter {
    inner: HistoricalExchange,
    token: CancellationToken,
    after: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl ExchangeClient for CancelAfter {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let page = self.inner.fetch_candles(symbol, interval, since, limit).await;
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        page
    }
}

#[tokio::test]
async fn test_cancellation_flushes_buffer() {
    let dir = TempDir::new().unwrap();
    let token = CancellationToken::new();
    let exchange = CancelAfter {
        inner: HistoricalExchange::new(synthetic_candles(jan_first(), Interval::Minute1, 100.0)),
        token: token.clone(),
        after: 2,
        calls: AtomicUsize::new(0),
    };
    let store = SqliteStore::in_memory().await.unwrap();
    let sync = Synchronizer::new(exchange, store, floors(&dir).await, config().with_page_limit(60))
        .with_cancellation(token);
    let key = SeriesKey::new("BTCUSDT", Interval::Minute1);

    let report = sync.sync(&SyncRequest::new(key.clone(), jan_first())).await;

    assert_eq!(report.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(report.outcome, SyncOutcome::PartiallySaved);
    assert_eq!(report.rows_written, 120);
    assert_eq!(sync.store().read_series(&key).await.unwrap().candles.len(), 120);
}

#[tokio::test]
async fn test_endless_empties_stop_at_iteration_cap() {
    let dir = TempDir::new().unwrap();
    let cfg = config()
        .with_max_consecutive_empty(u32::MAX)
        .with_max_iterations(40);
    let store = SqliteStore::in_memory().await.unwrap();
    let sync = Synchronizer::new(ScriptedExchange::always_empty(), store, floors(&dir).await, cfg);

    let report = sync
        .sync(&SyncRequest::new(SeriesKey::new("BTCUSDT", Interval::Minute1), jan_first()))
        .await;

    assert_eq!(report.stop_reason, Some(StopReason::IterationCap));
    assert_eq!(report.outcome, SyncOutcome::Failed);
    assert_eq!(sync.exchange().call_count(), 40);
}

#[tokio::test]
async fn test_sync_all_on_both_backends() {
    let dir = TempDir::new().unwrap();
    let range = TimeRange::new(utc(2024, 1, 1), utc(2024, 1, 1) + TimeDelta::hours(6)).unwrap();
    let requests: Vec<SyncRequest> = ["BTCUSDT", "ETHUSDT", "SOLUSDT"]
        .into_iter()
        .map(|symbol| SyncRequest::new(SeriesKey::new(symbol, Interval::Minute15), range))
        .collect();

    let csv = Synchronizer::new(
        HistoricalExchange::new(synthetic_candles(range, Interval::Minute15, 50.0)),
        CsvStore::new(dir.path().join("csv")),
        floors(&dir).await,
        config().with_max_concurrent_series(2),
    );
    let sqlite = Synchronizer::new(
        HistoricalExchange::new(synthetic_candles(range, Interval::Minute15, 50.0)),
        SqliteStore::open(dir.path().join("candles.db")).await.unwrap(),
        FloorTracker::load(dir.path().join("floors-sqlite.json")).await.unwrap(),
        config().with_max_concurrent_series(2),
    );

    let csv_reports = csv.sync_all(requests.clone()).await;
    let sqlite_reports = sqlite.sync_all(requests.clone()).await;

    for reports in [&csv_reports, &sqlite_reports] {
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.is_success() && r.rows_written == 24));
    }
    for request in &requests {
        let from_csv = csv.store().read_series(&request.key).await.unwrap().candles;
        let from_sqlite = sqlite.store().read_series(&request.key).await.unwrap().candles;
        assert_eq!(from_csv.len(), 24);
        assert_eq!(from_csv, from_sqlite);
    }
}

#[test]
fn test_stop_reason_serializes_with_instant() {
    let json = serde_json::to_value(StopReason::DataFloorReached(utc(2019, 3, 1))).unwrap();
    assert_eq!(json["reason"], "data_floor_reached");
    assert_eq!(json["at"], "2019-03-01T00:00:00Z");
}
