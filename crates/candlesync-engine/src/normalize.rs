//! Sorting, deduplication and merging of candle batches.

use candlesync_types::{Candle, RawCandle, SeriesKey};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Sorts by timestamp and drops repeated timestamps, keeping the first
/// occurrence.
///
/// The sort is stable, so callers may feed overlapping windows and rely on
/// the earliest-supplied row winning. `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    candles
}

/// Converts exchange rows for `key` and normalizes them.
///
/// Rows with a missing or out-of-range timestamp are dropped and counted in a
/// warning.
#[must_use]
pub fn normalize_raw(key: &SeriesKey, raws: Vec<RawCandle>) -> Vec<Candle> {
    let total = raws.len();
    let candles: Vec<Candle> = raws
        .into_iter()
        .filter_map(|raw| raw.into_candle(key))
        .collect();

    let dropped = total - candles.len();
    if dropped > 0 {
        tracing::warn!(
            target: "candlesync::normalize",
            series = %key,
            dropped,
            "dropped rows without a usable timestamp"
        );
    }
    normalize(candles)
}

/// Merges a persisted series with newly fetched rows.
///
/// On a timestamp collision the persisted OHLCV values are kept and a funding
/// rate carried by the incoming row replaces the stored one. The result is
/// normalized.
#[must_use]
pub fn merge_series(existing: Vec<Candle>, incoming: Vec<Candle>) -> Vec<Candle> {
    let mut by_time: BTreeMap<_, Candle> = normalize(existing)
        .into_iter()
        .map(|c| (c.timestamp, c))
        .collect();

    for candle in normalize(incoming) {
        match by_time.entry(candle.timestamp) {
            Entry::Occupied(mut slot) => {
                if candle.funding_rate.is_some() {
                    slot.get_mut().funding_rate = candle.funding_rate;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(candle);
            }
        }
    }

    by_time.into_values().collect()
}
