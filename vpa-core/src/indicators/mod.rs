//! Indicator helpers feeding the Feature Engine and Risk Engine.
//!
//! Unlike a sweep-oriented backtester that precomputes whole-series indicator
//! vectors ahead of the bar loop, the VPA pipeline consumes bars one at a
//! time and must never read past the bar currently under evaluation. These
//! helpers are therefore plain functions over a prior-bars slice rather than
//! a precomputed `Vec<f64>` indexed by bar position.

pub mod atr;
pub mod sma;

pub use atr::{compute_atr, true_range};
pub use sma::trailing_mean;

/// Build a synthetic bar series for testing, one bar per `(open, high, low, close, volume)` tuple.
#[cfg(test)]
pub fn make_bars(data: &[(f64, f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::{TimeZone, Utc};

    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Bar {
            symbol: "TEST".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
            bar_index: Some(i as u64),
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-9;
