//! Average True Range, used by the Risk Engine for ATR-based stop placement.
//!
//! `ATR(n)` here is a simple moving average of True Range, not Wilder's
//! smoothed variant — matching the simpler formulation the rest of this
//! pipeline's thresholds were tuned against.

use crate::domain::Bar;

/// True Range for `current`, given the previous bar's close (`None` for the
/// first bar in a series, in which case range collapses to `high - low`).
pub fn true_range(current: &Bar, prev_close: Option<f64>) -> f64 {
    match prev_close {
        None => current.high - current.low,
        Some(pc) => (current.high - current.low)
            .max((current.high - pc).abs())
            .max((current.low - pc).abs()),
    }
}

/// Average True Range over the trailing `period` bars of `bars` (the whole
/// series ending at the last element). Returns `0.0` if fewer than two bars
/// are available, since a single bar has no previous close to form a proper
/// true range from.
pub fn compute_atr(bars: &[Bar], period: usize) -> f64 {
    if bars.len() < 2 || period == 0 {
        return 0.0;
    }

    let mut trs = Vec::with_capacity(bars.len() - 1);
    for i in 1..bars.len() {
        trs.push(true_range(&bars[i], Some(bars[i - 1].close)));
    }

    let start = trs.len().saturating_sub(period);
    let window = &trs[start..];
    window.iter().sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_with_no_prev_close_is_high_minus_low() {
        let bars = make_bars(&[(100.0, 105.0, 95.0, 102.0, 1000.0)]);
        assert_eq!(true_range(&bars[0], None), 10.0);
    }

    #[test]
    fn true_range_handles_gap_up() {
        let gapped = make_bars(&[
            (98.0, 102.0, 97.0, 100.0, 1000.0),
            (110.0, 115.0, 108.0, 112.0, 1000.0),
        ]);
        // max(115-108=7, |115-100|=15, |108-100|=8) = 15
        assert_eq!(true_range(&gapped[1], Some(100.0)), 15.0);
    }

    #[test]
    fn atr_averages_true_range_window() {
        let bars = make_bars(&[
            (100.0, 105.0, 95.0, 102.0, 1000.0),  // TR n/a (first bar)
            (102.0, 108.0, 100.0, 106.0, 1000.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0, 1000.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0, 1000.0),   // TR = 6
        ]);
        // last 3 TRs: 8, 9, 6 -> mean = 23/3
        assert_approx(compute_atr(&bars, 3), 23.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_uses_fewer_trs_when_history_is_short() {
        let bars = make_bars(&[
            (100.0, 105.0, 95.0, 102.0, 1000.0),
            (102.0, 108.0, 100.0, 106.0, 1000.0),
        ]);
        // only one TR available (8.0), period 14 still averages just that one
        assert_approx(compute_atr(&bars, 14), 8.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_is_zero_with_fewer_than_two_bars() {
        let bars = make_bars(&[(100.0, 105.0, 95.0, 102.0, 1000.0)]);
        assert_eq!(compute_atr(&bars, 14), 0.0);
        assert_eq!(compute_atr(&[], 14), 0.0);
    }
}
