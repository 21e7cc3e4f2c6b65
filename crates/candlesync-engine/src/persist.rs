//! The append / merge / rewrite decision.

use candlesync_store::StoreAdapter;
use candlesync_types::{Candle, ColumnSet, SeriesKey};

use crate::normalize::{merge_series, normalize};
use crate::validate::{Jump, RejectedRow, find_jumps, screen};
use crate::{PersistenceError, SyncConfig};

/// How a batch reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The series did not exist yet.
    Fresh,
    /// Rows were appended after the persisted tail.
    Append,
    /// The batch overlapped persisted data and the series was rewritten.
    Merge,
    /// The batch needed columns the series lacked; the series was rewritten
    /// with the union of both layouts.
    Rewrite,
    /// Nothing new to write.
    Skipped,
}

/// Outcome of [`persist`].
#[derive(Debug, Clone, PartialEq)]
pub struct PersistReport {
    /// The path the batch took.
    pub mode: WriteMode,
    /// Rows from this batch handed to the backend.
    pub rows_written: usize,
    /// Rows rejected as structurally invalid.
    pub rejected: Vec<RejectedRow>,
    /// Suspicious close-to-close moves in the batch (logged, not rejected).
    pub jumps: Vec<Jump>,
}

impl PersistReport {
    /// Returns true if anything was written.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        !matches!(self.mode, WriteMode::Skipped)
    }
}

/// Persists `candles` for `key`.
///
/// Invalid rows are rejected and reported; the rest are normalized and
/// written:
///
/// 1. If the stored series lacks a column the batch needs, the series is
///    rewritten with the union layout.
/// 2. If nothing is stored, the batch is written fresh.
/// 3. If the batch starts after the stored tail (within the overlap
///    tolerance), it is appended. Rows at or before the tail are dropped
///    unless the store resolves conflicts itself.
/// 4. Otherwise the stored series is read, merged with the batch and
///    rewritten.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if the store cannot be read or written.
pub async fn persist<S: StoreAdapter + ?Sized>(
    store: &S,
    key: &SeriesKey,
    candles: &[Candle],
    config: &SyncConfig,
) -> Result<PersistReport, PersistenceError> {
    let wrap = |e| PersistenceError::new(key, e);

    let (accepted, rejected) = screen(candles);
    if !rejected.is_empty() {
        tracing::warn!(
            target: "candlesync::persist",
            series = %key,
            rejected = rejected.len(),
            first = %rejected[0].defect,
            "rejected structurally invalid rows"
        );
    }

    let batch = normalize(accepted);
    let mut report = PersistReport {
        mode: WriteMode::Skipped,
        rows_written: 0,
        rejected,
        jumps: Vec::new(),
    };
    let Some(first_new) = batch.first().map(|c| c.timestamp) else {
        return Ok(report);
    };

    let incoming = ColumnSet::of(&batch);
    let stored = store.columns(key).await.map_err(wrap)?;
    let last_known = store.last_timestamp(key).await.map_err(wrap)?;

    match (stored, last_known) {
        (Some(columns), Some(_)) if columns.union(incoming) != columns => {
            let existing = store.read_series(key).await.map_err(wrap)?;
            let merged = merge_series(existing.candles, batch.clone());
            store
                .write_full(key, &merged, columns.union(incoming))
                .await
                .map_err(wrap)?;
            report.mode = WriteMode::Rewrite;
            report.rows_written = batch.len();
        }
        (stored, None) => {
            let columns = stored.map_or(incoming, |c| c.union(incoming));
            store.write_full(key, &batch, columns).await.map_err(wrap)?;
            report.mode = WriteMode::Fresh;
            report.rows_written = batch.len();
        }
        (stored, Some(last)) if first_new > last - config.overlap_tolerance() => {
            let rows: Vec<Candle> = if store.upserts() {
                batch.clone()
            } else {
                batch.iter().filter(|c| c.timestamp > last).cloned().collect()
            };
            if rows.is_empty() {
                return Ok(report);
            }
            if stored.is_none() {
                store.write_full(key, &rows, incoming).await.map_err(wrap)?;
            } else {
                store.write_append(key, &rows).await.map_err(wrap)?;
            }
            report.mode = WriteMode::Append;
            report.rows_written = rows.len();
        }
        (stored, Some(_)) => {
            let existing = store.read_series(key).await.map_err(wrap)?;
            if !existing.malformed.is_empty() {
                tracing::warn!(
                    target: "candlesync::persist",
                    series = %key,
                    dropped = existing.malformed.len(),
                    "merge drops undecodable stored rows"
                );
            }
            let columns = stored.map_or(incoming, |c| c.union(incoming));
            let merged = merge_series(existing.candles, batch.clone());
            store.write_full(key, &merged, columns).await.map_err(wrap)?;
            report.mode = WriteMode::Merge;
            report.rows_written = batch.len();
        }
    }

    report.jumps = find_jumps(&batch, config.jump_warn_ratio);
    for jump in &report.jumps {
        tracing::warn!(
            target: "candlesync::persist",
            series = %key,
            timestamp = %jump.timestamp,
            previous_close = jump.previous_close,
            close = jump.close,
            "suspicious price jump"
        );
    }

    tracing::debug!(
        target: "candlesync::persist",
        series = %key,
        mode = ?report.mode,
        rows = report.rows_written,
        "persisted batch"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlesync_store::{CsvStore, SqliteStore};
    use candlesync_types::Interval;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn key() -> SeriesKey {
        SeriesKey::new("BTCUSDT", Interval::Minute1)
    }

    fn minute(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, m, 0).unwrap()
    }

    fn bars(minutes: std::ops::Range<u32>) -> Vec<Candle> {
        minutes
            .map(|m| {
                let p = 100.0 + f64::from(m % 7);
                Candle::new(&key(), minute(m), p, p + 1.0, p - 1.0, p, 1.0)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fresh_then_append_then_merge_on_csv() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let config = SyncConfig::default();

        let first = persist(&store, &key(), &bars(10..20), &config).await.unwrap();
        assert_eq!(first.mode, WriteMode::Fresh);

        // Starts one bucket before the tail: inside the tolerance, so append.
        let second = persist(&store, &key(), &bars(19..30), &config).await.unwrap();
        assert_eq!(second.mode, WriteMode::Append);
        assert_eq!(second.rows_written, 10);

        // Reaches back before the stored range: merge.
        let third = persist(&store, &key(), &bars(0..12), &config).await.unwrap();
        assert_eq!(third.mode, WriteMode::Merge);

        let stored = store.read_series(&key()).await.unwrap();
        assert_eq!(stored.candles, bars(0..30));
    }

    #[tokio::test]
    async fn test_funding_column_forces_rewrite_on_csv() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let config = SyncConfig::default();
        persist(&store, &key(), &bars(0..5), &config).await.unwrap();

        let funded: Vec<Candle> = bars(5..7)
            .into_iter()
            .map(|c| c.with_funding_rate(0.0001))
            .collect();
        let report = persist(&store, &key(), &funded, &config).await.unwrap();

        assert_eq!(report.mode, WriteMode::Rewrite);
        let stored = store.read_series(&key()).await.unwrap();
        assert_eq!(stored.columns, ColumnSet::OhlcvFunding);
        assert_eq!(stored.candles.len(), 7);
        assert_eq!(stored.candles[6].funding_rate, Some(0.0001));
    }

    #[tokio::test]
    async fn test_invalid_rows_are_rejected_not_fatal() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut rows = bars(0..5);
        rows[2].volume = -3.0;

        let report = persist(&store, &key(), &rows, &SyncConfig::default())
            .await
            .unwrap();

        assert!(report.is_written());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rows_written, 4);
    }

    #[tokio::test]
    async fn test_empty_batch_is_skipped() {
        let store = SqliteStore::in_memory().await.unwrap();
        let report = persist(&store, &key(), &[], &SyncConfig::default())
            .await
            .unwrap();
        assert!(!report.is_written());
    }

    #[tokio::test]
    async fn test_jumps_are_reported() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut rows = bars(0..3);
        rows[1] = Candle::new(&key(), minute(1), 400.0, 401.0, 399.0, 400.0, 1.0);

        let report = persist(&store, &key(), &rows, &SyncConfig::default())
            .await
            .unwrap();
        assert_eq!(report.jumps.len(), 2);
    }

    #[tokio::test]
    async fn test_persist_is_idempotent_on_both_backends() {
        let dir = TempDir::new().unwrap();
        let csv = CsvStore::new(dir.path().join("csv"));
        let sqlite = SqliteStore::open(dir.path().join("candles.db")).await.unwrap();
        let config = SyncConfig::default();
        let batch = bars(0..30);

        for store in [&csv as &dyn StoreAdapter, &sqlite as &dyn StoreAdapter] {
            persist(store, &key(), &batch, &config).await.unwrap();
            persist(store, &key(), &batch, &config).await.unwrap();

            assert_eq!(store.first_timestamp(&key()).await.unwrap(), Some(minute(0)));
            assert_eq!(store.last_timestamp(&key()).await.unwrap(), Some(minute(29)));
            assert_eq!(store.read_series(&key()).await.unwrap().candles, batch);
        }
    }
}
