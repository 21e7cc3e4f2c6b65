//! Relational backend: every series in one SQLite table.

use async_trait::async_trait;
use candlesync_types::{Candle, ColumnSet, SeriesCoverage, SeriesKey};
use chrono::{DateTime, Utc};
use sqlx::{
    Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;

use crate::{MalformedRow, Result, StoreAdapter, StoredSeries};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS candles (
    symbol TEXT NOT NULL,
    interval TEXT NOT NULL,
    ts INTEGER NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    funding_rate REAL,
    PRIMARY KEY (symbol, interval, ts)
)";

const INSERT_KEEP_EXISTING: &str = r"
INSERT INTO candles (symbol, interval, ts, open, high, low, close, volume, funding_rate)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (symbol, interval, ts) DO NOTHING";

const INSERT_UPDATE_FUNDING: &str = r"
INSERT INTO candles (symbol, interval, ts, open, high, low, close, volume, funding_rate)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (symbol, interval, ts) DO UPDATE SET funding_rate = excluded.funding_rate";

type Row = (i64, f64, f64, f64, f64, f64, Option<f64>);

/// Stores every series in a `candles` table keyed by `(symbol, interval, ts)`.
///
/// Timestamps are epoch seconds. Appends never overwrite existing OHLCV
/// values; a row carrying a funding rate updates only that column.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Wraps an existing pool, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_all(
        tx: &mut Transaction<'static, Sqlite>,
        key: &SeriesKey,
        candles: &[Candle],
    ) -> Result<()> {
        for candle in candles {
            let statement = if candle.funding_rate.is_some() {
                INSERT_UPDATE_FUNDING
            } else {
                INSERT_KEEP_EXISTING
            };
            sqlx::query(statement)
                .bind(&key.symbol)
                .bind(key.interval.as_str())
                .bind(candle.timestamp.timestamp())
                .bind(candle.open)
                .bind(candle.high)
                .bind(candle.low)
                .bind(candle.close)
                .bind(candle.volume)
                .bind(candle.funding_rate)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn bounds(&self, key: &SeriesKey) -> Result<(Option<i64>, Option<i64>)> {
        let bounds = sqlx::query_as::<_, (Option<i64>, Option<i64>)>(
            "SELECT MIN(ts), MAX(ts) FROM candles WHERE symbol = ? AND interval = ?",
        )
        .bind(&key.symbol)
        .bind(key.interval.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(bounds)
    }
}

fn instant(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[async_trait]
impl StoreAdapter for SqliteStore {
    async fn first_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        Ok(instant(self.bounds(key).await?.0))
    }

    async fn last_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        Ok(instant(self.bounds(key).await?.1))
    }

    async fn coverage(&self, key: &SeriesKey) -> Result<Option<SeriesCoverage>> {
        let (first, last) = self.bounds(key).await?;
        Ok(instant(first)
            .zip(instant(last))
            .map(|(first, last)| SeriesCoverage::new(key.clone(), first, last)))
    }

    async fn columns(&self, key: &SeriesKey) -> Result<Option<ColumnSet>> {
        // The table always carries the funding column.
        let (first, _) = self.bounds(key).await?;
        Ok(first.map(|_| ColumnSet::OhlcvFunding))
    }

    async fn read_series(&self, key: &SeriesKey) -> Result<StoredSeries> {
        let rows = sqlx::query_as::<_, Row>(
            r"
            SELECT ts, open, high, low, close, volume, funding_rate
            FROM candles
            WHERE symbol = ? AND interval = ?
            ORDER BY ts ASC
            ",
        )
        .bind(&key.symbol)
        .bind(key.interval.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut series = StoredSeries {
            candles: Vec::with_capacity(rows.len()),
            columns: ColumnSet::OhlcvFunding,
            malformed: Vec::new(),
        };
        for (ts, open, high, low, close, volume, funding_rate) in rows {
            let Some(timestamp) = instant(Some(ts)) else {
                series.malformed.push(MalformedRow {
                    position: ts.unsigned_abs(),
                    reason: format!("timestamp {ts} out of range"),
                });
                continue;
            };
            let mut candle = Candle::new(key, timestamp, open, high, low, close, volume);
            candle.funding_rate = funding_rate;
            series.candles.push(candle);
        }
        Ok(series)
    }

    async fn write_append(&self, key: &SeriesKey, candles: &[Candle]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_all(&mut tx, key, candles).await?;
        tx.commit().await?;
        tracing::debug!(
            target: "candlesync::store",
            series = %key,
            rows = candles.len(),
            "upserted SQLite rows"
        );
        Ok(())
    }

    async fn write_full(
        &self,
        key: &SeriesKey,
        candles: &[Candle],
        _columns: ColumnSet,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM candles WHERE symbol = ? AND interval = ?")
            .bind(&key.symbol)
            .bind(key.interval.as_str())
            .execute(&mut *tx)
            .await?;
        Self::insert_all(&mut tx, key, candles).await?;
        tx.commit().await?;
        tracing::debug!(
            target: "candlesync::store",
            series = %key,
            rows = candles.len(),
            "replaced SQLite series"
        );
        Ok(())
    }

    fn upserts(&self) -> bool {
        true
    }
}
