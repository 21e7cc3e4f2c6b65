//! Flat-file backend: one CSV file per symbol and interval.

use async_trait::async_trait;
use candlesync_types::{Candle, ColumnSet, SeriesCoverage, SeriesKey, parse_utc_instant};
use chrono::{DateTime, SecondsFormat, Utc};
use csv_async::{AsyncReaderBuilder, AsyncWriterBuilder, ByteRecord, StringRecord};
use futures::StreamExt;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::fs::replace_file;
use crate::{KeyLocks, MalformedRow, Result, StoreAdapter, StoreError, StoredSeries};

/// Bytes read per step when scanning back for the last row.
const TAIL_CHUNK: u64 = 4096;

/// Stores each series as `<root>/<SYMBOL>/<interval>.csv`.
///
/// The header row encodes the column layout:
/// `timestamp,open,high,low,close,volume[,funding_rate]`, with timestamps
/// written as RFC 3339 in UTC.
///
/// Writers keep rows in timestamp order, so the first and last timestamps are
/// read from the head and tail of the file without decoding the rest.
#[derive(Debug)]
pub struct CsvStore {
    root: PathBuf,
    locks: KeyLocks,
}

impl CsvStore {
    /// Creates a store rooted at `root`. Directories are created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: KeyLocks::new(),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file backing `key`.
    #[must_use]
    pub fn series_path(&self, key: &SeriesKey) -> PathBuf {
        self.root
            .join(&key.symbol)
            .join(format!("{}.csv", key.interval.as_str()))
    }

    async fn open(path: &Path) -> Result<Option<tokio::fs::File>> {
        match tokio::fs::File::open(path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn read_header(path: &Path) -> Result<Option<ColumnSet>> {
        let Some(file) = Self::open(path).await? else {
            return Ok(None);
        };
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .create_reader(file);
        let header = reader.headers().await.map_err(|e| csv_err(path, e))?;
        parse_header(path, header)
    }

    async fn read_file(path: &Path, key: &SeriesKey) -> Result<Option<StoredSeries>> {
        let Some(file) = Self::open(path).await? else {
            return Ok(None);
        };
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .create_reader(file);
        let header = reader.headers().await.map_err(|e| csv_err(path, e))?.clone();
        let Some(columns) = parse_header(path, &header)? else {
            return Ok(None);
        };

        let mut series = StoredSeries {
            candles: Vec::new(),
            columns,
            malformed: Vec::new(),
        };
        let mut records = reader.byte_records();
        let mut line = 1u64;
        while let Some(record) = records.next().await {
            line += 1;
            let decoded = match record {
                Ok(record) => decode_row(key, &record, columns),
                Err(e) if is_row_error(&e) => Err(e.to_string()),
                Err(e) => return Err(csv_err(path, e)),
            };
            match decoded {
                Ok(candle) => series.candles.push(candle),
                Err(reason) => series.malformed.push(MalformedRow {
                    position: line,
                    reason,
                }),
            }
        }

        if !series.malformed.is_empty() {
            tracing::warn!(
                target: "candlesync::store",
                path = %path.display(),
                malformed = series.malformed.len(),
                "skipped undecodable CSV rows"
            );
        }
        Ok(Some(series))
    }

    async fn bounds(&self, key: &SeriesKey) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let path = self.series_path(key);
        let Some(series) = Self::read_file(&path, key).await? else {
            return Ok(None);
        };
        let first = series.candles.iter().map(|c| c.timestamp).min();
        let last = series.candles.iter().map(|c| c.timestamp).max();
        Ok(first.zip(last))
    }

    /// First decodable row, without reading past it.
    async fn head(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        let path = self.series_path(key);
        let Some(file) = Self::open(&path).await? else {
            return Ok(None);
        };
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .create_reader(file);
        let header = reader.headers().await.map_err(|e| csv_err(&path, e))?.clone();
        let Some(columns) = parse_header(&path, &header)? else {
            return Ok(None);
        };

        let mut records = reader.byte_records();
        while let Some(record) = records.next().await {
            match record {
                Ok(record) => {
                    if let Ok(candle) = decode_row(key, &record, columns) {
                        return Ok(Some(candle.timestamp));
                    }
                }
                Err(e) if is_row_error(&e) => {}
                Err(e) => return Err(csv_err(&path, e)),
            }
        }
        Ok(None)
    }

    /// Last row, read by scanning back from the end of the file. Falls back
    /// to a full scan when that row cannot be decoded.
    async fn tail(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        let path = self.series_path(key);
        let Some(columns) = Self::read_header(&path).await? else {
            return Ok(None);
        };
        let Some(line) = last_line(&path).await? else {
            return Ok(None);
        };

        let mut reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .create_reader(line.as_slice());
        let mut record = ByteRecord::new();
        let decoded = match reader.read_byte_record(&mut record).await {
            Ok(true) => decode_row(key, &record, columns).ok(),
            _ => None,
        };
        if let Some(candle) = decoded {
            return Ok(Some(candle.timestamp));
        }
        Ok(self.bounds(key).await?.map(|(_, last)| last))
    }

    async fn write_file(&self, key: &SeriesKey, candles: &[Candle], columns: ColumnSet) -> Result<()> {
        let path = self.series_path(key);
        let bytes = encode(&path, candles, columns, true).await?;
        replace_file(&path, bytes).await?;
        tracing::debug!(
            target: "candlesync::store",
            series = %key,
            rows = candles.len(),
            "rewrote CSV series"
        );
        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for CsvStore {
    async fn first_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        self.head(key).await
    }

    async fn last_timestamp(&self, key: &SeriesKey) -> Result<Option<DateTime<Utc>>> {
        self.tail(key).await
    }

    async fn coverage(&self, key: &SeriesKey) -> Result<Option<SeriesCoverage>> {
        let (Some(first), Some(last)) = (self.head(key).await?, self.tail(key).await?) else {
            return Ok(None);
        };
        Ok(Some(SeriesCoverage::new(key.clone(), first, last)))
    }

    async fn columns(&self, key: &SeriesKey) -> Result<Option<ColumnSet>> {
        Self::read_header(&self.series_path(key)).await
    }

    async fn read_series(&self, key: &SeriesKey) -> Result<StoredSeries> {
        let path = self.series_path(key);
        Ok(Self::read_file(&path, key)
            .await?
            .unwrap_or_else(StoredSeries::empty))
    }

    async fn write_append(&self, key: &SeriesKey, candles: &[Candle]) -> Result<()> {
        if candles.is_empty() {
            return Ok(());
        }
        let _guard = self.locks.lock(key).await;
        let path = self.series_path(key);

        let Some(columns) = Self::read_header(&path).await? else {
            return self.write_file(key, candles, ColumnSet::of(candles)).await;
        };
        let needed = ColumnSet::of(candles);
        if columns.union(needed) != columns {
            return Err(StoreError::ColumnMismatch {
                path,
                stored: columns,
                incoming: needed,
            });
        }

        let mut bytes = encode(&path, candles, columns, false).await?;
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        let original_len = file.metadata().await.map_err(io_err)?.len();

        // A torn last line must not swallow the first appended row.
        if original_len > 0 {
            file.seek(SeekFrom::End(-1)).await.map_err(io_err)?;
            if file.read_u8().await.map_err(io_err)? != b'\n' {
                bytes.insert(0, b'\n');
            }
        }

        let written = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        if let Err(source) = written {
            if let Err(e) = file.set_len(original_len).await {
                tracing::warn!(
                    target: "candlesync::store",
                    path = %path.display(),
                    error = %e,
                    "failed to truncate after partial append"
                );
            }
            return Err(io_err(source));
        }

        tracing::debug!(
            target: "candlesync::store",
            series = %key,
            rows = candles.len(),
            "appended CSV rows"
        );
        Ok(())
    }

    async fn write_full(
        &self,
        key: &SeriesKey,
        candles: &[Candle],
        columns: ColumnSet,
    ) -> Result<()> {
        let _guard = self.locks.lock(key).await;
        self.write_file(key, candles, columns).await
    }
}

fn csv_err(path: &Path, source: csv_async::Error) -> StoreError {
    StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Errors confined to a single row; the reader can continue past them.
fn is_row_error(e: &csv_async::Error) -> bool {
    matches!(
        e.kind(),
        csv_async::ErrorKind::Utf8 { .. } | csv_async::ErrorKind::UnequalLengths { .. }
    )
}

/// Returns the last non-empty line of `path`, or `None` for a missing or
/// empty file.
async fn last_line(path: &Path) -> Result<Option<Vec<u8>>> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(e)),
    };

    let mut end = file.metadata().await.map_err(io_err)?.len();
    let mut tail: Vec<u8> = Vec::new();
    while end > 0 {
        let start = end.saturating_sub(TAIL_CHUNK);
        let mut chunk = vec![0u8; (end - start) as usize];
        file.seek(SeekFrom::Start(start)).await.map_err(io_err)?;
        file.read_exact(&mut chunk).await.map_err(io_err)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
        end = start;

        let trimmed = trim_line_end(&tail);
        if let Some(pos) = trimmed.iter().rposition(|&b| b == b'\n') {
            return Ok(Some(trimmed[pos + 1..].to_vec()));
        }
    }

    let trimmed = trim_line_end(&tail);
    Ok((!trimmed.is_empty()).then(|| trimmed.to_vec()))
}

fn trim_line_end(bytes: &[u8]) -> &[u8] {
    let len = bytes
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map_or(0, |i| i + 1);
    &bytes[..len]
}

fn parse_header(path: &Path, header: &StringRecord) -> Result<Option<ColumnSet>> {
    if header.is_empty() {
        return Ok(None);
    }
    let fields: Vec<&str> = header.iter().map(str::trim).collect();
    [ColumnSet::Ohlcv, ColumnSet::OhlcvFunding]
        .into_iter()
        .find(|columns| columns.headers() == fields.as_slice())
        .map(Some)
        .ok_or_else(|| StoreError::UnknownHeader {
            path: path.to_path_buf(),
            header: fields.join(","),
        })
}

fn decode_row(
    key: &SeriesKey,
    record: &ByteRecord,
    columns: ColumnSet,
) -> std::result::Result<Candle, String> {
    let fields = record
        .iter()
        .map(std::str::from_utf8)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid UTF-8: {e}"))?;
    let field = |i: usize| fields.get(i).map(|f| f.trim()).unwrap_or_default();
    let number = |i: usize, name: &str| {
        field(i)
            .parse::<f64>()
            .map_err(|_| format!("invalid {name} '{}'", field(i)))
    };

    if record.len() != columns.headers().len() {
        return Err(format!(
            "expected {} fields, found {}",
            columns.headers().len(),
            record.len()
        ));
    }

    let timestamp = parse_utc_instant(field(0))
        .map_err(|_| format!("unparseable timestamp '{}'", field(0)))?;
    let mut candle = Candle::new(
        key,
        timestamp,
        number(1, "open")?,
        number(2, "high")?,
        number(3, "low")?,
        number(4, "close")?,
        number(5, "volume")?,
    );
    if columns.has_funding() && !field(6).is_empty() {
        candle = candle.with_funding_rate(number(6, "funding_rate")?);
    }
    Ok(candle)
}

fn encode_row(candle: &Candle, columns: ColumnSet) -> Vec<String> {
    let mut row = vec![
        candle.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        candle.open.to_string(),
        candle.high.to_string(),
        candle.low.to_string(),
        candle.close.to_string(),
        candle.volume.to_string(),
    ];
    if columns.has_funding() {
        row.push(candle.funding_rate.map(|f| f.to_string()).unwrap_or_default());
    }
    row
}

async fn encode(
    path: &Path,
    candles: &[Candle],
    columns: ColumnSet,
    with_header: bool,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = AsyncWriterBuilder::new()
            .has_headers(false)
            .create_writer(&mut buf);
        if with_header {
            writer
                .write_record(columns.headers())
                .await
                .map_err(|e| csv_err(path, e))?;
        }
        for candle in candles {
            writer
                .write_record(encode_row(candle, columns))
                .await
                .map_err(|e| csv_err(path, e))?;
        }
        writer.flush().await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlesync_types::Interval;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn key() -> SeriesKey {
        SeriesKey::new("BTCUSDT", Interval::Hour1)
    }

    fn candles(hours: std::ops::Range<u32>) -> Vec<Candle> {
        hours
            .map(|h| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();
                let p = 100.0 + f64::from(h);
                Candle::new(&key(), ts, p, p + 1.0, p - 1.0, p + 0.5, 10.0)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_missing_series_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());

        assert_eq!(store.coverage(&key()).await.unwrap(), None);
        assert_eq!(store.columns(&key()).await.unwrap(), None);
        assert!(store.read_series(&key()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_full_then_read() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let rows = candles(0..5);

        store.write_full(&key(), &rows, ColumnSet::Ohlcv).await.unwrap();

        let path = store.series_path(&key());
        assert!(path.ends_with("BTCUSDT/1h.csv"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("timestamp,open,high,low,close,volume\n"));
        assert!(text.contains("2024-01-01T00:00:00Z,100,101,99,100.5,10"));

        let series = store.read_series(&key()).await.unwrap();
        assert_eq!(series.candles, rows);
        assert_eq!(series.columns, ColumnSet::Ohlcv);

        let coverage = store.coverage(&key()).await.unwrap().unwrap();
        assert_eq!(coverage.first_timestamp, rows[0].timestamp);
        assert_eq!(coverage.last_timestamp, rows[4].timestamp);
    }

    #[tokio::test]
    async fn test_append_extends_file() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());

        store.write_append(&key(), &candles(0..3)).await.unwrap();
        store.write_append(&key(), &candles(3..6)).await.unwrap();

        let series = store.read_series(&key()).await.unwrap();
        assert_eq!(series.candles, candles(0..6));
        let text = std::fs::read_to_string(store.series_path(&key())).unwrap();
        assert_eq!(text.matches("timestamp").count(), 1);
    }

    #[tokio::test]
    async fn test_append_rejects_wider_columns() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        store.write_full(&key(), &candles(0..2), ColumnSet::Ohlcv).await.unwrap();

        let funded: Vec<_> = candles(2..3)
            .into_iter()
            .map(|c| c.with_funding_rate(0.0001))
            .collect();
        let result = store.write_append(&key(), &funded).await;

        assert!(matches!(result, Err(StoreError::ColumnMismatch { .. })));
        assert_eq!(store.read_series(&key()).await.unwrap().candles.len(), 2);
    }

    #[tokio::test]
    async fn test_funding_column_allows_blank_values() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let mut rows = candles(0..2);
        rows[1] = rows[1].clone().with_funding_rate(-0.00025);

        store.write_full(&key(), &rows, ColumnSet::OhlcvFunding).await.unwrap();

        let series = store.read_series(&key()).await.unwrap();
        assert_eq!(series.columns, ColumnSet::OhlcvFunding);
        assert_eq!(series.candles[0].funding_rate, None);
        assert_eq!(series.candles[1].funding_rate, Some(-0.00025));
    }

    #[tokio::test]
    async fn test_malformed_rows_are_reported() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let path = store.series_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n\
             2024-01-01T00:00:00Z,1,2,0.5,1.5,3\n\
             2024-01-01 01:00:00,1,2,0.5,1.5,3\n\
             2024-01-01T02:00:00Z,abc,2,0.5,1.5,3\n",
        )
        .unwrap();

        let series = store.read_series(&key()).await.unwrap();
        assert_eq!(series.candles.len(), 1);
        assert_eq!(series.malformed.len(), 2);
        assert_eq!(series.malformed[0].position, 3);
        assert!(series.malformed[0].reason.contains("timestamp"));
    }

    #[tokio::test]
    async fn test_unknown_header_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let path = store.series_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "time,price\n").unwrap();

        assert!(matches!(
            store.columns(&key()).await,
            Err(StoreError::UnknownHeader { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_row_is_malformed_not_fatal() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let path = store.series_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut bytes = b"timestamp,open,high,low,close,volume\n\
            2024-01-01T00:00:00Z,100,101,99,100.5,10\n"
            .to_vec();
        bytes.extend_from_slice(b"2024-01-01T01:00:00Z,1\xff1,102,100,101.5,10\n");
        bytes.extend_from_slice(b"2024-01-01T02:00:00Z,102,103,101,102.5,10\n");
        std::fs::write(&path, bytes).unwrap();

        let series = store.read_series(&key()).await.unwrap();
        assert_eq!(series.candles.len(), 2);
        assert_eq!(series.malformed.len(), 1);
        assert_eq!(series.malformed[0].position, 3);
        assert!(series.malformed[0].reason.contains("UTF-8"));

        // Rewriting the decodable rows clears the damage.
        store.write_full(&key(), &series.candles, series.columns).await.unwrap();
        let repaired = store.read_series(&key()).await.unwrap();
        assert!(repaired.malformed.is_empty());
        assert_eq!(repaired.candles.len(), 2);
    }

    #[tokio::test]
    async fn test_first_and_last_read_from_file_ends() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rows: Vec<_> = (0..500_u32)
            .map(|h| {
                let ts = start + chrono::TimeDelta::hours(i64::from(h));
                let p = 100.0 + f64::from(h);
                Candle::new(&key(), ts, p, p + 1.0, p - 1.0, p, 10.0)
            })
            .collect();
        store.write_full(&key(), &rows, ColumnSet::Ohlcv).await.unwrap();
        assert!(std::fs::metadata(store.series_path(&key())).unwrap().len() > TAIL_CHUNK * 2);

        assert_eq!(store.first_timestamp(&key()).await.unwrap(), Some(rows[0].timestamp));
        assert_eq!(store.last_timestamp(&key()).await.unwrap(), Some(rows[499].timestamp));

        // A torn final line falls back to scanning every row.
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.series_path(&key()))
            .unwrap();
        std::io::Write::write_all(&mut file, b"2030-01-01T00:00:00Z,1,2").unwrap();
        drop(file);

        assert_eq!(store.last_timestamp(&key()).await.unwrap(), Some(rows[499].timestamp));
        let coverage = store.coverage(&key()).await.unwrap().unwrap();
        assert_eq!(coverage.first_timestamp, rows[0].timestamp);
        assert_eq!(coverage.last_timestamp, rows[499].timestamp);
    }

    #[tokio::test]
    async fn test_first_timestamp_skips_leading_bad_rows() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let path = store.series_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n\
             garbage,1,2,0.5,1.5,3\n\
             2024-01-01T03:00:00Z,1,2,0.5,1.5,3\n",
        )
        .unwrap();

        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        assert_eq!(store.first_timestamp(&key()).await.unwrap(), Some(expected));
        assert_eq!(store.last_timestamp(&key()).await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_header_only_file_has_no_bounds() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        store.write_full(&key(), &[], ColumnSet::Ohlcv).await.unwrap();

        assert_eq!(store.first_timestamp(&key()).await.unwrap(), None);
        assert_eq!(store.last_timestamp(&key()).await.unwrap(), None);
        assert_eq!(store.coverage(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_append_after_torn_line_starts_new_row() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        let path = store.series_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n\
             2024-01-01T00:00:00Z,100,101,99,100.5,10\n\
             2024-01-01T01:00:00Z,101,10",
        )
        .unwrap();

        store.write_append(&key(), &candles(2..3)).await.unwrap();

        let series = store.read_series(&key()).await.unwrap();
        assert_eq!(series.candles, [candles(0..1), candles(2..3)].concat());
        assert_eq!(series.malformed.len(), 1);
        assert_eq!(series.malformed[0].position, 3);
        assert_eq!(
            store.last_timestamp(&key()).await.unwrap(),
            Some(candles(2..3)[0].timestamp)
        );
    }
}
