//! Context Engine — derives trend, location, congestion, and volume-trend
//! state from bar history for a single timeframe.

use serde::{Deserialize, Serialize};

use crate::config::VpaConfig;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Range,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLocation {
    Top,
    Bottom,
    Middle,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeTrend {
    Rising,
    Falling,
    Flat,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DominantAlignment {
    With,
    Against,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Congestion {
    pub active: bool,
    pub range_high: Option<f64>,
    pub range_low: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub trend: Trend,
    pub trend_strength: TrendStrength,
    pub trend_location: TrendLocation,
    pub volume_trend: VolumeTrend,
    pub congestion: Congestion,
    pub dominant_alignment: DominantAlignment,
}

/// Build a `ContextSnapshot` for `history`'s last bar. Resolving
/// `dominant_alignment` beyond `Unknown` is the Daily-Context Resolver's job
/// (`crate::daily_context`), not this one — it stays `Unknown` here.
pub fn analyze(history: &[Bar], config: &VpaConfig) -> ContextSnapshot {
    let trend_lookback = config.trend.window_k.min(history.len().saturating_sub(1));
    let (trend, trend_strength) = analyze_trend(history, trend_lookback);
    let trend_location = analyze_location(history, config.trend.location_lookback);
    let congestion = analyze_congestion(
        history,
        config.trend.congestion_window,
        config.trend.location_lookback,
        config.trend.congestion_pct,
    );
    let volume_trend = analyze_volume_trend(history, trend_lookback);

    ContextSnapshot {
        trend,
        trend_strength,
        trend_location,
        volume_trend,
        congestion,
        dominant_alignment: DominantAlignment::Unknown,
    }
}

fn analyze_trend(history: &[Bar], lookback: usize) -> (Trend, TrendStrength) {
    if lookback == 0 || history.len() < 2 {
        return (Trend::Unknown, TrendStrength::Weak);
    }
    let window = &history[history.len() - lookback - 1..];
    let (mut ups, mut downs) = (0usize, 0usize);
    for pair in window.windows(2) {
        if pair[1].close > pair[0].close {
            ups += 1;
        } else if pair[1].close < pair[0].close {
            downs += 1;
        }
    }
    let transitions = ups + downs;
    if transitions == 0 {
        return (Trend::Unknown, TrendStrength::Weak);
    }

    let trend = if ups > downs {
        Trend::Up
    } else if downs > ups {
        Trend::Down
    } else {
        Trend::Range
    };

    let strength = if trend == Trend::Range {
        TrendStrength::Weak
    } else {
        let ratio = ups.max(downs) as f64 / lookback as f64;
        if ratio >= 0.80 {
            TrendStrength::Strong
        } else if ratio >= 0.60 {
            TrendStrength::Moderate
        } else {
            TrendStrength::Weak
        }
    };

    (trend, strength)
}

fn analyze_location(history: &[Bar], lookback: usize) -> TrendLocation {
    if history.len() < 2 {
        return TrendLocation::Unknown;
    }
    let start = history.len().saturating_sub(lookback);
    let window = &history[start..];
    let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    if highest <= lowest {
        return TrendLocation::Unknown;
    }
    let last_close = history.last().unwrap().close;
    let pct = (last_close - lowest) / (highest - lowest);
    if pct >= 0.75 {
        TrendLocation::Top
    } else if pct <= 0.25 {
        TrendLocation::Bottom
    } else {
        TrendLocation::Middle
    }
}

fn analyze_congestion(
    history: &[Bar],
    congestion_window: usize,
    wider_window: usize,
    congestion_pct: f64,
) -> Congestion {
    if history.is_empty() {
        return Congestion {
            active: false,
            range_high: None,
            range_low: None,
        };
    }
    let recent_start = history.len().saturating_sub(congestion_window);
    let recent = &history[recent_start..];
    let recent_high = recent.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let recent_low = recent.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let recent_range = recent_high - recent_low;

    let wider_start = history.len().saturating_sub(wider_window);
    let wider = &history[wider_start..];
    let wider_high = wider.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let wider_low = wider.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let wider_range = wider_high - wider_low;

    let active = wider_range > 0.0 && (recent_range / wider_range) < congestion_pct;

    Congestion {
        active,
        range_high: Some(recent_high),
        range_low: Some(recent_low),
    }
}

fn analyze_volume_trend(history: &[Bar], lookback: usize) -> VolumeTrend {
    if lookback == 0 || history.len() < 2 {
        return VolumeTrend::Unknown;
    }
    let window = &history[history.len() - lookback - 1..];
    let (mut rising, mut falling) = (0usize, 0usize);
    for pair in window.windows(2) {
        if pair[1].volume > pair[0].volume {
            rising += 1;
        } else if pair[1].volume < pair[0].volume {
            falling += 1;
        }
    }
    if rising > falling {
        VolumeTrend::Rising
    } else if falling > rising {
        VolumeTrend::Falling
    } else if rising == 0 {
        VolumeTrend::Unknown
    } else {
        VolumeTrend::Flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn cfg() -> VpaConfig {
        VpaConfig::default()
    }

    fn uptrend_bars(n: usize) -> Vec<Bar> {
        let data: Vec<(f64, f64, f64, f64, f64)> = (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                (close - 1.0, close + 1.0, close - 2.0, close, 100_000.0)
            })
            .collect();
        make_bars(&data)
    }

    #[test]
    fn uptrend_is_detected() {
        let bars = uptrend_bars(15);
        let snapshot = analyze(&bars, &cfg());
        assert_eq!(snapshot.trend, Trend::Up);
        assert_eq!(snapshot.trend_strength, TrendStrength::Strong);
    }

    #[test]
    fn zero_transitions_is_unknown() {
        let bars = make_bars(&[(100.0, 101.0, 99.0, 100.0, 1000.0)]);
        let snapshot = analyze(&bars, &cfg());
        assert_eq!(snapshot.trend, Trend::Unknown);
    }

    #[test]
    fn location_top_at_pct_0_75_boundary() {
        // highest=110, lowest=100 over lookback; last_close chosen so pct == 0.75 exactly.
        let mut data: Vec<(f64, f64, f64, f64, f64)> = vec![
            (100.0, 110.0, 100.0, 105.0, 1000.0),
            (100.0, 105.0, 100.0, 103.0, 1000.0),
        ];
        data.push((100.0, 101.0, 100.0, 107.5, 1000.0));
        let bars = make_bars(&data);
        let snapshot = analyze(&bars, &VpaConfig {
            trend: crate::config::TrendConfig {
                window_k: 14,
                location_lookback: 3,
                congestion_window: 2,
                congestion_pct: 0.5,
            },
            ..cfg()
        });
        assert_eq!(snapshot.trend_location, TrendLocation::Top);
    }

    #[test]
    fn location_bottom_at_pct_0_25_boundary() {
        let data: Vec<(f64, f64, f64, f64, f64)> = vec![
            (100.0, 110.0, 100.0, 105.0, 1000.0),
            (100.0, 105.0, 100.0, 103.0, 1000.0),
            (100.0, 101.0, 100.0, 102.5, 1000.0),
        ];
        let bars = make_bars(&data);
        let snapshot = analyze(&bars, &VpaConfig {
            trend: crate::config::TrendConfig {
                window_k: 14,
                location_lookback: 3,
                congestion_window: 2,
                congestion_pct: 0.5,
            },
            ..cfg()
        });
        assert_eq!(snapshot.trend_location, TrendLocation::Bottom);
    }

    #[test]
    fn degenerate_range_location_is_unknown() {
        let bars = make_bars(&[
            (100.0, 100.0, 100.0, 100.0, 1000.0),
            (100.0, 100.0, 100.0, 100.0, 1000.0),
        ]);
        let snapshot = analyze(&bars, &cfg());
        assert_eq!(snapshot.trend_location, TrendLocation::Unknown);
    }

    #[test]
    fn congestion_flips_active_below_threshold() {
        let mut data = vec![(100.0, 120.0, 80.0, 100.0, 1000.0)]; // wide bar sets wider range
        for _ in 0..5 {
            data.push((100.0, 101.0, 99.0, 100.0, 1000.0)); // tight recent range
        }
        let bars = make_bars(&data);
        let config = VpaConfig {
            trend: crate::config::TrendConfig {
                window_k: 14,
                location_lookback: 6,
                congestion_window: 3,
                congestion_pct: 0.5,
            },
            ..cfg()
        };
        let snapshot = analyze(&bars, &config);
        assert!(snapshot.congestion.active);
        assert!(snapshot.congestion.range_high.is_some());
    }

    #[test]
    fn volume_trend_rising_on_majority() {
        let data: Vec<(f64, f64, f64, f64, f64)> = (0..10)
            .map(|i| (100.0, 101.0, 99.0, 100.0, 10_000.0 * (i + 1) as f64))
            .collect();
        let bars = make_bars(&data);
        let snapshot = analyze(&bars, &cfg());
        assert_eq!(snapshot.volume_trend, VolumeTrend::Rising);
    }

    #[test]
    fn dominant_alignment_defaults_unknown() {
        let bars = uptrend_bars(5);
        let snapshot = analyze(&bars, &cfg());
        assert_eq!(snapshot.dominant_alignment, DominantAlignment::Unknown);
    }
}
