//! In-memory exchanges for tests.

use async_trait::async_trait;
use candlesync_types::{Interval, RawCandle, TimeRange};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::{ExchangeClient, FetchError};

/// One scripted response.
pub type ScriptedResponse = Result<Vec<RawCandle>, FetchError>;

/// Replays a fixed sequence of responses, then answers empty forever.
#[derive(Debug, Default)]
pub struct ScriptedExchange {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: Mutex<Vec<DateTime<Utc>>>,
}

impl ScriptedExchange {
    /// Creates an exchange that replays `responses` in order.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates an exchange that only ever answers empty.
    #[must_use]
    pub fn always_empty() -> Self {
        Self::default()
    }

    /// Returns the `since` argument of every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DateTime<Utc>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ExchangeClient for ScriptedExchange {
    async fn fetch_candles(
        &self,
        _symbol: &str,
        _interval: Interval,
        since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(since);
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Serves pages out of a fixed history, the way a well-behaved REST API does.
#[derive(Debug)]
pub struct HistoricalExchange {
    candles: Vec<RawCandle>,
    failures: Mutex<VecDeque<(usize, FetchError)>>,
    calls: Mutex<usize>,
}

impl HistoricalExchange {
    /// Creates an exchange over `candles`.
    #[must_use]
    pub fn new(mut candles: Vec<RawCandle>) -> Self {
        candles.sort_by_key(|c| c.timestamp_ms);
        Self {
            candles,
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
        }
    }

    /// Makes the `call`-th request (zero-based) fail with `error`.
    #[must_use]
    pub fn with_failure_on_call(self, call: usize, error: FetchError) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((call, error));
        self
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ExchangeClient for HistoricalExchange {
    async fn fetch_candles(
        &self,
        _symbol: &str,
        _interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            let call = *calls;
            *calls += 1;
            call
        };

        {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(pos) = failures.iter().position(|(at, _)| *at == call) {
                if let Some((_, error)) = failures.remove(pos) {
                    return Err(error);
                }
            }
        }

        let since_ms = since.timestamp_millis();
        Ok(self
            .candles
            .iter()
            .filter(|c| c.timestamp_ms.is_some_and(|ts| ts >= since_ms))
            .take(limit)
            .copied()
            .collect())
    }
}

/// Generates one well-formed raw candle per bucket of `range`.
///
/// Prices follow a deterministic zig-zag around `base_price`.
#[must_use]
pub fn synthetic_candles(range: TimeRange, interval: Interval, base_price: f64) -> Vec<RawCandle> {
    range
        .buckets(interval)
        .enumerate()
        .map(|(i, ts)| {
            let step = f64::from(u32::try_from(i % 20).unwrap_or(0));
            let open = base_price + step;
            let close = open + if i % 2 == 0 { 0.5 } else { -0.5 };
            let high = open.max(close) + 0.25;
            let low = open.min(close) - 0.25;
            RawCandle::new(ts.timestamp_millis(), open, high, low, close, 10.0 + step)
        })
        .collect()
}
