//! Fixture generators for the candlesync benchmarks.

use candlesync_types::{Candle, Interval, SeriesKey};
use chrono::{DateTime, TimeZone, Utc};

/// Series key used by every fixture.
#[must_use]
pub fn bench_key(interval: Interval) -> SeriesKey {
    SeriesKey::new("BENCHUSDT", interval)
}

/// First bucket of every fixture.
#[must_use]
pub fn origin() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// `len` contiguous, well-formed candles starting at [`origin`].
#[must_use]
pub fn contiguous(interval: Interval, len: usize) -> Vec<Candle> {
    let key = bench_key(interval);
    let step = interval.duration();
    let mut ts = origin();
    (0..len)
        .map(|i| {
            let open = 100.0 + (i % 50) as f64 * 0.1;
            let close = open + if i % 2 == 0 { 0.05 } else { -0.05 };
            let candle = Candle::new(
                &key,
                ts,
                open,
                open.max(close) + 0.02,
                open.min(close) - 0.02,
                close,
                1.0 + (i % 7) as f64,
            );
            ts += step;
            candle
        })
        .collect()
}

/// A contiguous series reordered deterministically, with every
/// `duplicate_every`-th row repeated, the way overlapping pages arrive.
#[must_use]
pub fn scrambled(interval: Interval, len: usize, duplicate_every: usize) -> Vec<Candle> {
    let sorted = contiguous(interval, len);
    let mut out = Vec::with_capacity(len + len / duplicate_every.max(1));
    // Interleave pages back to front so the input is far from sorted.
    for page in sorted.chunks(500).rev() {
        for (i, candle) in page.iter().enumerate() {
            out.push(candle.clone());
            if duplicate_every > 0 && i % duplicate_every == 0 {
                out.push(candle.clone());
            }
        }
    }
    out
}

/// A contiguous series with every `hole_every`-th row removed.
#[must_use]
pub fn holey(interval: Interval, len: usize, hole_every: usize) -> Vec<Candle> {
    contiguous(interval, len)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| hole_every == 0 || i % hole_every != 0)
        .map(|(_, c)| c)
        .collect()
}
