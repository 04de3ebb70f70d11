//! Rule Engine — pure predicate detectors over `CandleFeatures` and
//! `ContextSnapshot`, collected in a fixed evaluation order.
//!
//! Detectors are grouped bar-level, trend-level, cluster-level,
//! confirmation, then avoidance — and are evaluated in exactly that order
//! within one bar, because the Setup Composer's invalidation pass scans all
//! of a bar's signals together and the composer's conservation invariant
//! depends on that fixed ordering being stable across replays.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::VpaConfig;
use crate::context::ContextSnapshot;
use crate::context::VolumeTrend;
use crate::domain::SignalEventId;
use crate::features::{CandleFeatures, CandleType, SpreadState, VolState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalClass {
    Validation,
    Anomaly,
    Strength,
    Weakness,
    Avoidance,
    Confirmation,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionBias {
    Bullish,
    Bearish,
    BearishOrWait,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub id: SignalEventId,
    pub name: String,
    pub tf: String,
    pub ts: DateTime<Utc>,
    pub signal_class: SignalClass,
    pub direction_bias: DirectionBias,
    pub priority: i32,
    pub evidence: HashMap<String, f64>,
    pub requires_context_gate: bool,
}

impl SignalEvent {
    /// `"{id}@{ts}"`, the key context gates use to key `block_reasons`.
    pub fn signal_key(&self) -> String {
        format!("{}@{}", self.id, self.ts.to_rfc3339())
    }
}

/// Names in the hard-avoidance set used by the Setup Composer's LONG
/// invalidation rule.
pub const HARD_AVOIDANCE_SET: &[&str] = &["AVOID-NEWS-1"];

struct RuleDef {
    name: &'static str,
    class: SignalClass,
    bias: DirectionBias,
    priority: i32,
    gate: bool,
}

fn base_evidence(features: &CandleFeatures) -> HashMap<String, f64> {
    let mut evidence = HashMap::new();
    evidence.insert("bar_low".to_string(), features.bar_low);
    evidence.insert("bar_high".to_string(), features.bar_high);
    evidence
}

fn emit(
    def: &RuleDef,
    evidence: HashMap<String, f64>,
    tf: &str,
    ts: DateTime<Utc>,
    id: SignalEventId,
) -> SignalEvent {
    SignalEvent {
        id,
        name: def.name.to_string(),
        tf: tf.to_string(),
        ts,
        signal_class: def.class,
        direction_bias: def.bias,
        priority: def.priority,
        evidence,
        requires_context_gate: def.gate,
    }
}

/// Run every detector over one bar's `CandleFeatures` and `ContextSnapshot`
/// in the fixed bar → trend → cluster → conf-2 → avoidance order, assigning
/// sequential `SignalEventId`s via `next_id` as each detector fires.
pub fn detect_all(
    features: &CandleFeatures,
    context: &ContextSnapshot,
    config: &VpaConfig,
    tf: &str,
    ts: DateTime<Utc>,
    mut next_id: impl FnMut() -> SignalEventId,
) -> Vec<SignalEvent> {
    let mut out = Vec::new();

    // --- bar-level ---
    if let Some(ev) = val_1(features) {
        out.push(emit(&ev.0, ev.1, tf, ts, next_id()));
    }
    if let Some(ev) = anom_1(features) {
        out.push(emit(&ev.0, ev.1, tf, ts, next_id()));
    }
    if let Some(ev) = anom_2(features) {
        out.push(emit(&ev.0, ev.1, tf, ts, next_id()));
    }
    let hammer_shape = shape_ratios(features, &config.candle_patterns.hammer, true);
    if hammer_shape {
        let def = RuleDef {
            name: "STR-1",
            class: SignalClass::Strength,
            bias: DirectionBias::Bullish,
            priority: 4,
            gate: true,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }
    let shooting_star_shape = shape_ratios(features, &config.candle_patterns.shooting_star, false);
    if shooting_star_shape {
        let def = RuleDef {
            name: "WEAK-1",
            class: SignalClass::Weakness,
            bias: DirectionBias::Bearish,
            priority: 2,
            gate: true,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }
    if let Some(ev) = test_sup_1(features) {
        out.push(emit(&ev.0, ev.1, tf, ts, next_id()));
    }
    if let Some(ev) = test_sup_2(features) {
        out.push(emit(&ev.0, ev.1, tf, ts, next_id()));
    }
    if let Some(ev) = test_dem_1(features, &config.candle_patterns.shooting_star) {
        out.push(emit(&ev.0, ev.1, tf, ts, next_id()));
    }

    // --- trend-level ---
    if context.trend == crate::context::Trend::Up && context.volume_trend == VolumeTrend::Rising {
        let def = RuleDef {
            name: "TREND-VAL-1",
            class: SignalClass::Validation,
            bias: DirectionBias::Bullish,
            priority: 4,
            gate: false,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }
    if context.trend == crate::context::Trend::Up && context.volume_trend == VolumeTrend::Falling {
        let def = RuleDef {
            name: "TREND-ANOM-1",
            class: SignalClass::Anomaly,
            bias: DirectionBias::BearishOrWait,
            priority: 2,
            gate: true,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }

    // --- cluster-level (built on the shooting-star shape) ---
    if shooting_star_shape && features.vol_state == VolState::Low {
        let def = RuleDef {
            name: "WEAK-2",
            class: SignalClass::Weakness,
            bias: DirectionBias::Bearish,
            priority: 1,
            gate: true,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }
    if shooting_star_shape && matches!(features.vol_state, VolState::High | VolState::UltraHigh) {
        let def = RuleDef {
            name: "CLIMAX-SELL-1",
            class: SignalClass::Weakness,
            bias: DirectionBias::Bearish,
            priority: 2,
            gate: true,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }

    // --- confirmation ---
    if features.candle_type == CandleType::Up
        && matches!(features.vol_state, VolState::Average | VolState::High | VolState::UltraHigh)
        && matches!(features.spread_state, SpreadState::Normal | SpreadState::Wide)
    {
        let def = RuleDef {
            name: "CONF-1",
            class: SignalClass::Confirmation,
            bias: DirectionBias::Bullish,
            priority: 3,
            gate: false,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }

    // --- avoidance ---
    if is_long_legged_doji(features, &config.candle_patterns.long_legged_doji)
        && features.vol_state == VolState::Low
    {
        let def = RuleDef {
            name: "AVOID-NEWS-1",
            class: SignalClass::Avoidance,
            bias: DirectionBias::Neutral,
            priority: 0,
            gate: false,
        };
        out.push(emit(&def, base_evidence(features), tf, ts, next_id()));
    }

    out
}

fn val_1(features: &CandleFeatures) -> Option<(RuleDef, HashMap<String, f64>)> {
    if features.candle_type == CandleType::Up
        && features.spread_state == SpreadState::Wide
        && matches!(features.vol_state, VolState::High | VolState::UltraHigh)
    {
        Some((
            RuleDef {
                name: "VAL-1",
                class: SignalClass::Validation,
                bias: DirectionBias::Bullish,
                priority: 4,
                gate: false,
            },
            base_evidence(features),
        ))
    } else {
        None
    }
}

fn anom_1(features: &CandleFeatures) -> Option<(RuleDef, HashMap<String, f64>)> {
    if features.candle_type == CandleType::Up
        && features.spread_state == SpreadState::Wide
        && features.vol_state == VolState::Low
    {
        Some((
            RuleDef {
                name: "ANOM-1",
                class: SignalClass::Anomaly,
                bias: DirectionBias::BearishOrWait,
                priority: 2,
                gate: true,
            },
            base_evidence(features),
        ))
    } else {
        None
    }
}

fn anom_2(features: &CandleFeatures) -> Option<(RuleDef, HashMap<String, f64>)> {
    if matches!(features.vol_state, VolState::High | VolState::UltraHigh)
        && matches!(features.spread_state, SpreadState::Narrow | SpreadState::Normal)
    {
        Some((
            RuleDef {
                name: "ANOM-2",
                class: SignalClass::Anomaly,
                bias: DirectionBias::BearishOrWait,
                priority: 2,
                gate: true,
            },
            base_evidence(features),
        ))
    } else {
        None
    }
}

fn test_sup_1(features: &CandleFeatures) -> Option<(RuleDef, HashMap<String, f64>)> {
    if features.vol_state == VolState::Low
        && matches!(features.spread_state, SpreadState::Narrow | SpreadState::Normal)
    {
        Some((
            RuleDef {
                name: "TEST-SUP-1",
                class: SignalClass::Test,
                bias: DirectionBias::Bullish,
                priority: 4,
                gate: true,
            },
            base_evidence(features),
        ))
    } else {
        None
    }
}

fn test_sup_2(features: &CandleFeatures) -> Option<(RuleDef, HashMap<String, f64>)> {
    if matches!(features.vol_state, VolState::High | VolState::UltraHigh)
        && matches!(features.spread_state, SpreadState::Narrow | SpreadState::Normal)
    {
        Some((
            RuleDef {
                name: "TEST-SUP-2",
                class: SignalClass::Test,
                bias: DirectionBias::BearishOrWait,
                priority: 4,
                gate: true,
            },
            base_evidence(features),
        ))
    } else {
        None
    }
}

fn test_dem_1(
    features: &CandleFeatures,
    shooting_star: &crate::config::CandleShapeThresholds,
) -> Option<(RuleDef, HashMap<String, f64>)> {
    if features.range <= 0.0 {
        return None;
    }
    let body_ratio = features.spread / features.range;
    if body_ratio <= shooting_star.body_ratio_max
        && features.upper_wick > features.lower_wick
        && features.vol_state == VolState::Low
    {
        Some((
            RuleDef {
                name: "TEST-DEM-1",
                class: SignalClass::Test,
                bias: DirectionBias::Bearish,
                priority: 4,
                gate: true,
            },
            base_evidence(features),
        ))
    } else {
        None
    }
}

/// Shared hammer/shooting-star shape test: `lower_wick/range`, `spread/range`,
/// and `upper_wick/range` all measured against a threshold set. `hammer`
/// toggles which ratio the lower vs upper wick bound applies to isn't
/// needed — both shapes use the same three-ratio shape, just with the
/// roles of upper/lower wick swapped in the threshold values supplied.
fn shape_ratios(
    features: &CandleFeatures,
    thresholds: &crate::config::CandleShapeThresholds,
    _hammer: bool,
) -> bool {
    if features.range <= 0.0 {
        return false;
    }
    let lower_ratio = features.lower_wick / features.range;
    let body_ratio = features.spread / features.range;
    let upper_ratio = features.upper_wick / features.range;
    lower_ratio >= thresholds.lower_wick_ratio_min
        && body_ratio <= thresholds.body_ratio_max
        && upper_ratio <= thresholds.upper_wick_ratio_max
}

fn is_long_legged_doji(features: &CandleFeatures, thresholds: &crate::config::DojiThresholds) -> bool {
    if features.range <= 0.0 {
        return false;
    }
    let body_ratio = features.spread / features.range;
    let lower_ratio = features.lower_wick / features.range;
    let upper_ratio = features.upper_wick / features.range;
    body_ratio <= thresholds.body_ratio_max
        && lower_ratio >= thresholds.min_wick_ratio
        && upper_ratio >= thresholds.min_wick_ratio
}
