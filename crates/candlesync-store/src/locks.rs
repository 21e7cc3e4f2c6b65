//! Per-series writer serialization.

use candlesync_types::SeriesKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per [`SeriesKey`].
///
/// Writers of different series never contend; writers of the same series run
/// one at a time.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: DashMap<SeriesKey, Arc<Mutex<()>>>,
}

impl KeyLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: &SeriesKey) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is released before awaiting.
        let lock = self.locks.entry(key.clone()).or_default().value().clone();
        lock.lock_owned().await
    }

    /// Returns the number of series that have been locked at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no series has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
