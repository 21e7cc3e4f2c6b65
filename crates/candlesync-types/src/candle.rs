//! Candle representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Interval, SeriesKey};

/// One OHLCV record for a fixed time bucket.
///
/// A candle is unique per `(symbol, interval, timestamp)`. The timestamp is the
/// bucket open time in UTC with second precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Instrument symbol (e.g. `BTCUSDT`).
    pub symbol: String,
    /// Bucket width.
    pub interval: Interval,
    /// Bucket open time (UTC, whole seconds).
    pub timestamp: DateTime<Utc>,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
    /// Funding rate for perpetual contracts, if the source provides one.
    pub funding_rate: Option<f64>,
}

impl Candle {
    /// Creates a new candle without a funding rate.
    #[must_use]
    pub fn new(
        key: &SeriesKey,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: key.symbol.clone(),
            interval: key.interval,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            funding_rate: None,
        }
    }

    /// Sets the funding rate.
    #[must_use]
    pub const fn with_funding_rate(mut self, funding_rate: f64) -> Self {
        self.funding_rate = Some(funding_rate);
        self
    }

    /// Returns the series this candle belongs to.
    #[must_use]
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.symbol.clone(), self.interval)
    }

    /// Returns the first structural defect of this candle, if any.
    ///
    /// Checks run in a fixed order: finiteness, positivity, the high/low
    /// envelope and finally volume.
    #[must_use]
    pub fn defect(&self) -> Option<CandleDefect> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Some(CandleDefect::NonFinitePrice);
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Some(CandleDefect::NonPositivePrice);
        }
        if self.high < self.open.max(self.close).max(self.low) {
            return Some(CandleDefect::HighBelowRange);
        }
        if self.low > self.open.min(self.close).min(self.high) {
            return Some(CandleDefect::LowAboveRange);
        }
        if !self.volume.is_finite() {
            return Some(CandleDefect::NonFiniteVolume);
        }
        if self.volume < 0.0 {
            return Some(CandleDefect::NegativeVolume);
        }
        None
    }

    /// Returns true if the candle satisfies all structural invariants.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.defect().is_none()
    }
}

/// A structural violation that makes a candle unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleDefect {
    /// One of the prices is NaN or infinite.
    NonFinitePrice,
    /// One of the prices is zero or negative.
    NonPositivePrice,
    /// `high` is below open, close or low.
    HighBelowRange,
    /// `low` is above open, close or high.
    LowAboveRange,
    /// Volume is NaN or infinite.
    NonFiniteVolume,
    /// Volume is negative.
    NegativeVolume,
}

impl std::fmt::Display for CandleDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NonFinitePrice => "non-finite price",
            Self::NonPositivePrice => "non-positive price",
            Self::HighBelowRange => "high below open/close/low",
            Self::LowAboveRange => "low above open/close/high",
            Self::NonFiniteVolume => "non-finite volume",
            Self::NegativeVolume => "negative volume",
        };
        f.write_str(text)
    }
}

/// A candle as returned by an exchange, before normalization.
///
/// Exchanges report bucket open times in epoch milliseconds. A missing
/// timestamp marks the row as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    /// Bucket open time in epoch milliseconds.
    pub timestamp_ms: Option<i64>,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
    /// Funding rate, if provided.
    pub funding_rate: Option<f64>,
}

impl RawCandle {
    /// Creates a raw candle from an epoch-millisecond timestamp.
    #[must_use]
    pub const fn new(timestamp_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp_ms: Some(timestamp_ms),
            open,
            high,
            low,
            close,
            volume,
            funding_rate: None,
        }
    }

    /// Returns the bucket open time truncated to whole seconds.
    ///
    /// Returns `None` for missing or out-of-range timestamps.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let ms = self.timestamp_ms?;
        DateTime::from_timestamp(ms.div_euclid(1000), 0)
    }

    /// Converts into a [`Candle`] for the given series.
    ///
    /// Returns `None` if the timestamp cannot be interpreted.
    #[must_use]
    pub fn into_candle(self, key: &SeriesKey) -> Option<Candle> {
        let timestamp = self.timestamp()?;
        Some(Candle {
            symbol: key.symbol.clone(),
            interval: key.interval,
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            funding_rate: self.funding_rate,
        })
    }

    /// Builds a raw candle from a normalized one, e.g. to replay stored data.
    #[must_use]
    pub fn from_candle(candle: &Candle) -> Self {
        Self {
            timestamp_ms: Some(candle.timestamp.timestamp_millis()),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            funding_rate: candle.funding_rate,
        }
    }
}

/// Column layout of a persisted series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSet {
    /// timestamp, open, high, low, close, volume.
    Ohlcv,
    /// OHLCV plus a funding-rate column.
    OhlcvFunding,
}

impl ColumnSet {
    /// Returns the column set needed to hold every candle in `candles`.
    #[must_use]
    pub fn of(candles: &[Candle]) -> Self {
        if candles.iter().any(|c| c.funding_rate.is_some()) {
            Self::OhlcvFunding
        } else {
            Self::Ohlcv
        }
    }

    /// Returns the smallest column set covering both `self` and `other`.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        match (self, other) {
            (Self::Ohlcv, Self::Ohlcv) => Self::Ohlcv,
            _ => Self::OhlcvFunding,
        }
    }

    /// Returns the column names in file order.
    #[must_use]
    pub const fn headers(&self) -> &'static [&'static str] {
        match self {
            Self::Ohlcv => &["timestamp", "open", "high", "low", "close", "volume"],
            Self::OhlcvFunding => &[
                "timestamp",
                "open",
                "high",
                "low",
                "close",
                "volume",
                "funding_rate",
            ],
        }
    }

    /// Returns true if this layout has a funding-rate column.
    #[must_use]
    pub const fn has_funding(&self) -> bool {
        matches!(self, Self::OhlcvFunding)
    }
}
