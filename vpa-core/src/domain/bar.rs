//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol on a single timeframe.
///
/// Bars are immutable values; ordering is by `timestamp`, which is strictly
/// monotonic within a (symbol, timeframe) series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Sequential index assigned by the caller, if known (e.g. backtest bar counter).
    pub bar_index: Option<u64>,
}

/// Why a `Bar` failed its sanity check.
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar has a NaN OHLCV field")]
    Void,
    #[error("negative volume: {0}")]
    NegativeVolume(f64),
    #[error("low ({low}) exceeds min(open, close) ({min_oc})")]
    LowAboveBody { low: f64, min_oc: f64 },
    #[error("high ({high}) below max(open, close) ({max_oc})")]
    HighBelowBody { high: f64, max_oc: f64 },
}

impl Bar {
    /// True if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Validate the bar against the invariants of spec §3:
    /// `low <= min(open, close) <= max(open, close) <= high` and `volume >= 0`.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::Void);
        }
        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume(self.volume));
        }
        let min_oc = self.open.min(self.close);
        let max_oc = self.open.max(self.close);
        if self.low > min_oc {
            return Err(BarError::LowAboveBody {
                low: self.low,
                min_oc,
            });
        }
        if self.high < max_oc {
            return Err(BarError::HighBelowBody {
                high: self.high,
                max_oc,
            });
        }
        Ok(())
    }

    /// `true` iff `close >= open` (the candle's `candle_type` per §3 is UP).
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    /// Candle body magnitude: `|close - open|`.
    pub fn spread(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full candle extent: `high - low`.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// `high - max(open, close)`.
    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    /// `min(open, close) - low`.
    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
}
