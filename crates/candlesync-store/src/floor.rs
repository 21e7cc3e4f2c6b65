//! Data-floor tracking.

use candlesync_types::{DataFloor, SeriesKey};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::fs::replace_file;
use crate::{Result, StoreError};

/// `{symbol: {interval: instant}}`, as stored on disk.
type FloorMap = BTreeMap<String, BTreeMap<String, DateTime<Utc>>>;

/// Remembers, per series, the earliest instant the exchange has data for.
///
/// Floors are persisted as a JSON object keyed by symbol then interval, with
/// RFC 3339 instants. A floor is never deleted and only ever moves earlier.
/// Every accepted update rewrites the file atomically.
#[derive(Debug)]
pub struct FloorTracker {
    path: PathBuf,
    floors: RwLock<FloorMap>,
}

impl FloorTracker {
    /// Loads floors from `path`. A missing file is an empty tracker.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let floors = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => FloorMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => FloorMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            floors: RwLock::new(floors),
        })
    }

    /// Returns the default floor file location.
    ///
    /// Uses the `directories` crate to find the platform data directory:
    /// - Linux: `~/.local/share/candlesync/floors.json`
    /// - macOS: `~/Library/Application Support/candlesync/floors.json`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\candlesync\floors.json`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoDataDir`] if no home directory can be found.
    pub fn default_path() -> Result<PathBuf> {
        ProjectDirs::from("", "", "candlesync")
            .map(|dirs| dirs.data_dir().join("floors.json"))
            .ok_or(StoreError::NoDataDir)
    }

    /// Loads floors from [`Self::default_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be determined or the file is
    /// unreadable.
    pub async fn with_default_path() -> Result<Self> {
        Self::load(Self::default_path()?).await
    }

    /// Returns the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the floor for `key`, if one has been recorded.
    pub async fn get(&self, key: &SeriesKey) -> Option<DataFloor> {
        let floors = self.floors.read().await;
        floors
            .get(&key.symbol)
            .and_then(|by_interval| by_interval.get(key.interval.as_str()))
            .map(|instant| DataFloor::new(key.clone(), *instant))
    }

    /// Records a floor.
    ///
    /// Returns `true` if the tracker changed: either no floor existed for the
    /// series or the new one is earlier. Later floors are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten. The in-memory state is
    /// left unchanged in that case.
    pub async fn record(&self, floor: &DataFloor) -> Result<bool> {
        let mut floors = self.floors.write().await;
        let current = floors
            .get(&floor.key.symbol)
            .and_then(|by_interval| by_interval.get(floor.key.interval.as_str()))
            .copied();

        if current.is_some_and(|existing| existing <= floor.earliest_known_timestamp) {
            return Ok(false);
        }

        let mut updated = floors.clone();
        updated
            .entry(floor.key.symbol.clone())
            .or_default()
            .insert(
                floor.key.interval.as_str().to_string(),
                floor.earliest_known_timestamp,
            );

        let json = serde_json::to_vec_pretty(&updated).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        replace_file(&self.path, json).await?;
        *floors = updated;

        tracing::info!(
            target: "candlesync::floor",
            series = %floor.key,
            floor = %floor.earliest_known_timestamp.to_rfc3339(),
            previous = ?current.map(|t| t.to_rfc3339()),
            "recorded data floor"
        );
        Ok(true)
    }

    /// Returns every recorded floor.
    pub async fn all(&self) -> Vec<(String, String, DateTime<Utc>)> {
        let floors = self.floors.read().await;
        floors
            .iter()
            .flat_map(|(symbol, by_interval)| {
                by_interval
                    .iter()
                    .map(move |(interval, instant)| (symbol.clone(), interval.clone(), *instant))
            })
            .collect()
    }
}
