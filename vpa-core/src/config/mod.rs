//! `VpaConfig` — the deep-merged, validated, immutable threshold tree that
//! drives every classification and policy decision downstream.
//!
//! A config is loaded (by `vpa-runner`) as a base JSON document optionally
//! overridden by a per-symbol JSON document, deep-merged at the `Value`
//! level, then deserialized and validated here. Validation is hand-written
//! structural/range checking rather than a JSON-Schema crate — the
//! recognized sections below are exactly `VpaConfig`'s shape, so a schema
//! document would just restate this module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ConfigHash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpaConfig {
    pub vol: VolConfig,
    pub spread: SpreadConfig,
    pub trend: TrendConfig,
    pub setup: SetupConfig,
    pub gates: GatesConfig,
    pub execution: ExecutionConfig,
    pub candle_patterns: CandlePatternsConfig,
    pub risk: RiskConfig,
    pub volume_guard: VolumeGuardConfig,
    pub atr: AtrConfig,
    pub slippage: SlippageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolConfig {
    pub avg_window_n: usize,
    pub thresholds: VolThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolThresholds {
    pub low_lt: f64,
    pub high_gt: f64,
    pub ultra_high_gt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadConfig {
    pub avg_window_m: usize,
    pub thresholds: SpreadThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadThresholds {
    pub narrow_lt: f64,
    pub wide_gt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub window_k: usize,
    pub location_lookback: usize,
    pub congestion_window: usize,
    pub congestion_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    pub window_x: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ctx2Policy {
    Allow,
    ReduceRisk,
    Disallow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatesConfig {
    pub ctx1_trend_location_required: bool,
    pub ctx2_dominant_alignment_policy: Ctx2Policy,
    pub ctx3_congestion_awareness_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalEval {
    BarCloseOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryTiming {
    NextBarOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub signal_eval: SignalEval,
    pub entry_timing: EntryTiming,
    pub intrabar_allowed: bool,
}

/// Body/wick ratio thresholds shared by the hammer and shooting-star shape tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleShapeThresholds {
    pub lower_wick_ratio_min: f64,
    pub body_ratio_max: f64,
    pub upper_wick_ratio_max: f64,
}

/// Shape thresholds for the long-legged doji used by AVOID-NEWS-1: a tiny
/// body with wicks extending well into both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DojiThresholds {
    pub body_ratio_max: f64,
    pub min_wick_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlePatternsConfig {
    pub hammer: CandleShapeThresholds,
    pub shooting_star: CandleShapeThresholds,
    pub long_legged_doji: DojiThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub risk_pct_per_trade: f64,
    pub max_concurrent_positions: u32,
    pub countertrend_multiplier: f64,
    pub daily_loss_limit_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGuardConfig {
    pub enabled: bool,
    pub min_avg_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrConfig {
    pub period: usize,
    pub stop_multiplier: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageConfig {
    pub value: f64,
}

impl Default for VpaConfig {
    fn default() -> Self {
        Self {
            vol: VolConfig {
                avg_window_n: 20,
                thresholds: VolThresholds {
                    low_lt: 0.5,
                    high_gt: 1.5,
                    ultra_high_gt: 2.5,
                },
            },
            spread: SpreadConfig {
                avg_window_m: 20,
                thresholds: SpreadThresholds {
                    narrow_lt: 0.5,
                    wide_gt: 1.5,
                },
            },
            trend: TrendConfig {
                window_k: 14,
                location_lookback: 20,
                congestion_window: 10,
                congestion_pct: 0.5,
            },
            setup: SetupConfig { window_x: 5 },
            gates: GatesConfig {
                ctx1_trend_location_required: true,
                ctx2_dominant_alignment_policy: Ctx2Policy::Allow,
                ctx3_congestion_awareness_required: true,
            },
            execution: ExecutionConfig {
                signal_eval: SignalEval::BarCloseOnly,
                entry_timing: EntryTiming::NextBarOpen,
                intrabar_allowed: false,
            },
            candle_patterns: CandlePatternsConfig {
                hammer: CandleShapeThresholds {
                    lower_wick_ratio_min: 0.6,
                    body_ratio_max: 0.3,
                    upper_wick_ratio_max: 0.1,
                },
                shooting_star: CandleShapeThresholds {
                    lower_wick_ratio_min: 0.1,
                    body_ratio_max: 0.3,
                    upper_wick_ratio_max: 0.6,
                },
                long_legged_doji: DojiThresholds {
                    body_ratio_max: 0.1,
                    min_wick_ratio: 0.35,
                },
            },
            risk: RiskConfig {
                risk_pct_per_trade: 0.005,
                max_concurrent_positions: 1,
                countertrend_multiplier: 0.5,
                daily_loss_limit_pct: None,
            },
            volume_guard: VolumeGuardConfig {
                enabled: false,
                min_avg_volume: 0.0,
            },
            atr: AtrConfig {
                period: 14,
                stop_multiplier: 2.0,
                enabled: false,
            },
            slippage: SlippageConfig { value: 0.0005 },
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("invalid JSON in {path}: {source}")]
    InvalidJson { path: String, source: String },
    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

/// Deep-merge `override_doc` onto `base`: object values recurse key by key,
/// scalars and arrays in `override_doc` replace the corresponding value in
/// `base` wholesale, and keys only present in `override_doc` are added.
/// `base` is never mutated; the merged tree is returned as a new value.
pub fn deep_merge(base: &Value, override_doc: &Value) -> Value {
    match (base, override_doc) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, override_val) in override_map {
                let merged_val = match merged.get(key) {
                    Some(base_val) => deep_merge(base_val, override_val),
                    None => override_val.clone(),
                };
                merged.insert(key.clone(), merged_val);
            }
            Value::Object(merged)
        }
        (_, override_val) => override_val.clone(),
    }
}

/// Validate the numeric/enumeration invariants `VpaConfig`'s structure
/// alone cannot express (ordering between thresholds, ratios in `[0, 1]`).
pub fn validate(config: &VpaConfig) -> Result<(), ConfigError> {
    let v = &config.vol.thresholds;
    if !(v.low_lt < v.high_gt && v.high_gt < v.ultra_high_gt) {
        return Err(ConfigError::SchemaViolation(
            "vol.thresholds must satisfy low_lt < high_gt < ultra_high_gt".into(),
        ));
    }
    let s = &config.spread.thresholds;
    if !(s.narrow_lt < s.wide_gt) {
        return Err(ConfigError::SchemaViolation(
            "spread.thresholds must satisfy narrow_lt < wide_gt".into(),
        ));
    }
    if !(0.0..=1.0).contains(&config.trend.congestion_pct) {
        return Err(ConfigError::SchemaViolation(
            "trend.congestion_pct must be in [0, 1]".into(),
        ));
    }
    if config.setup.window_x == 0 {
        return Err(ConfigError::SchemaViolation(
            "setup.window_x must be >= 1".into(),
        ));
    }
    if !(0.0..=1.0).contains(&config.risk.risk_pct_per_trade) {
        return Err(ConfigError::SchemaViolation(
            "risk.risk_pct_per_trade must be in [0, 1]".into(),
        ));
    }
    if let Some(pct) = config.risk.daily_loss_limit_pct {
        if !(0.0..=1.0).contains(&pct) {
            return Err(ConfigError::SchemaViolation(
                "risk.daily_loss_limit_pct must be in [0, 1]".into(),
            ));
        }
    }
    if config.risk.countertrend_multiplier < 0.0 {
        return Err(ConfigError::SchemaViolation(
            "risk.countertrend_multiplier must be >= 0".into(),
        ));
    }
    if config.atr.period == 0 {
        return Err(ConfigError::SchemaViolation(
            "atr.period must be >= 1".into(),
        ));
    }
    if config.slippage.value < 0.0 {
        return Err(ConfigError::SchemaViolation(
            "slippage.value must be >= 0".into(),
        ));
    }
    Ok(())
}

/// Fingerprint a validated config for journal records and fixture caching.
/// Uses `serde_json`'s canonical-enough map ordering (BTreeMap-backed under
/// `preserve_order` is *not* assumed; callers needing cross-process stability
/// rely on `serde_json::to_string` producing the same bytes for the same
/// struct layout, which holds since `VpaConfig`'s field order is fixed).
pub fn fingerprint(config: &VpaConfig) -> ConfigHash {
    let bytes = serde_json::to_vec(config).expect("VpaConfig always serializes");
    ConfigHash::from_bytes(&bytes)
}
