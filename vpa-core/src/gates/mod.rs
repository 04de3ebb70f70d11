//! Context Gates — CTX-1 (trend/location known) → CTX-2 (dominant
//! alignment policy) → CTX-3 (congestion awareness), evaluated in that
//! order with short-circuit: once a gate blocks a signal, later gates are
//! not consulted and contribute no further block reasons.
//!
//! Only signals with `requires_context_gate == true` pass through here at
//! all — validation/confirmation/trend-validation signals bypass gating
//! entirely and are always actionable as far as this module is concerned.

use serde::{Deserialize, Serialize};

use crate::config::{Ctx2Policy, GatesConfig};
use crate::context::{ContextSnapshot, DominantAlignment, Trend, TrendLocation};
use crate::daily_context;
use crate::rules::{SignalClass, SignalEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub actionable: bool,
    pub blocked: bool,
    pub block_reasons: Vec<String>,
    /// Set by a CTX-2 `REDUCE_RISK` policy hit; the Risk Engine halves
    /// position size when this is set, the same as a counter-trend signal.
    pub reduce_risk: bool,
}

impl GateResult {
    fn pass() -> Self {
        Self {
            actionable: true,
            blocked: false,
            block_reasons: Vec::new(),
            reduce_risk: false,
        }
    }

    fn block(reason: impl Into<String>) -> Self {
        Self {
            actionable: false,
            blocked: true,
            block_reasons: vec![reason.into()],
            reduce_risk: false,
        }
    }
}

/// Apply the three context gates to one signal. Signals that don't require
/// gating (`requires_context_gate == false`) pass unconditionally.
pub fn apply_gates(
    signal: &SignalEvent,
    intraday: &ContextSnapshot,
    daily: Option<&ContextSnapshot>,
    config: &GatesConfig,
) -> GateResult {
    if !signal.requires_context_gate {
        return GateResult::pass();
    }

    // CTX-1: trend and location must be resolvable before a gated signal
    // can be actioned at all.
    if config.ctx1_trend_location_required
        && (intraday.trend == Trend::Unknown || intraday.trend_location == TrendLocation::Unknown)
    {
        return GateResult::block("CTX-1: trend or location undetermined");
    }

    // CTX-2: dominant alignment policy, resolved against the daily
    // snapshot when one is available; with no daily snapshot the
    // alignment is Unknown and the policy's ALLOW behavior applies.
    let alignment = match daily {
        Some(daily_snapshot) => daily_context::resolve(daily_snapshot, signal.direction_bias),
        None => intraday.dominant_alignment,
    };

    let mut reduce_risk = false;
    if alignment == DominantAlignment::Against {
        match config.ctx2_dominant_alignment_policy {
            Ctx2Policy::Disallow => {
                return GateResult::block("CTX-2: against dominant daily alignment");
            }
            Ctx2Policy::ReduceRisk => reduce_risk = true,
            Ctx2Policy::Allow => {}
        }
    }

    // CTX-3: congestion awareness. An active congestion zone only blocks
    // Anomaly-class signals (a big-effort-little-result or absorption
    // reading is unreliable inside a tight range); Validation, Strength,
    // Weakness, Test, and Confirmation signals all pass through.
    if config.ctx3_congestion_awareness_required
        && intraday.congestion.active
        && signal.signal_class == SignalClass::Anomaly
    {
        return GateResult::block("CTX-3: active congestion zone");
    }

    GateResult {
        actionable: true,
        blocked: false,
        block_reasons: Vec::new(),
        reduce_risk,
    }
}
