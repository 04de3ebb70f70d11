//! Feature Engine — turns a bar plus its prior history into `CandleFeatures`.

use serde::{Deserialize, Serialize};

use crate::config::VpaConfig;
use crate::domain::Bar;
use crate::indicators::trailing_mean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolState {
    Low,
    Average,
    High,
    UltraHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadState {
    Narrow,
    Normal,
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleType {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleFeatures {
    pub spread: f64,
    pub range: f64,
    pub upper_wick: f64,
    pub lower_wick: f64,
    pub spread_rel: f64,
    pub vol_rel: f64,
    pub vol_state: VolState,
    pub spread_state: SpreadState,
    pub candle_type: CandleType,
    pub bar_low: f64,
    pub bar_high: f64,
}

/// Extract `CandleFeatures` for the last bar of `history`.
///
/// `history` must be non-empty; the caller (the pipeline orchestrator) is
/// responsible for the empty-history short-circuit described for the
/// orchestrator's first step. The baselines average every bar in `history`
/// *before* the last one — the current bar never contributes to its own
/// classification.
pub fn extract_features(history: &[Bar], config: &VpaConfig) -> CandleFeatures {
    let current = history.last().expect("extract_features requires a non-empty history");
    let prior = &history[..history.len() - 1];

    let volumes: Vec<f64> = prior.iter().map(|b| b.volume).collect();
    let spreads: Vec<f64> = prior.iter().map(|b| b.spread()).collect();

    let vol_baseline = trailing_mean(&volumes, config.vol.avg_window_n);
    let spread_baseline = trailing_mean(&spreads, config.spread.avg_window_m);

    let vol_rel = if vol_baseline > 0.0 {
        current.volume / vol_baseline
    } else {
        0.0
    };
    let spread_rel = if spread_baseline > 0.0 {
        current.spread() / spread_baseline
    } else {
        0.0
    };

    let vol_state = classify_volume(vol_rel, &config.vol.thresholds);
    let spread_state = classify_spread(spread_rel, &config.spread.thresholds);
    let candle_type = if current.is_up() {
        CandleType::Up
    } else {
        CandleType::Down
    };

    CandleFeatures {
        spread: current.spread(),
        range: current.range(),
        upper_wick: current.upper_wick(),
        lower_wick: current.lower_wick(),
        spread_rel,
        vol_rel,
        vol_state,
        spread_state,
        candle_type,
        bar_low: current.low,
        bar_high: current.high,
    }
}

fn classify_volume(vol_rel: f64, thresholds: &crate::config::VolThresholds) -> VolState {
    if vol_rel < thresholds.low_lt {
        VolState::Low
    } else if vol_rel <= thresholds.high_gt {
        VolState::Average
    } else if vol_rel <= thresholds.ultra_high_gt {
        VolState::High
    } else {
        VolState::UltraHigh
    }
}

fn classify_spread(spread_rel: f64, thresholds: &crate::config::SpreadThresholds) -> SpreadState {
    if spread_rel < thresholds.narrow_lt {
        SpreadState::Narrow
    } else if spread_rel <= thresholds.wide_gt {
        SpreadState::Normal
    } else {
        SpreadState::Wide
    }
}
