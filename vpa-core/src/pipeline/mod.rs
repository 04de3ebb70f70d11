//! Pipeline Orchestrator — chains every stage for one bar: feature
//! extraction, context analysis, the volume-illiquidity guard, rule
//! detection, context gating, setup composition, and risk evaluation.
//!
//! `run_pipeline` takes `history` as `&[Bar]` up to and including the
//! current bar and nothing past it — callers must never pass a slice that
//! extends beyond the bar being evaluated, since every stage here assumes
//! `history.last()` is "now" and nothing after it has happened yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::VpaConfig;
use crate::context::{self, ContextSnapshot};
use crate::daily_context;
use crate::domain::{Bar, IdGen};
use crate::features::{self, CandleFeatures};
use crate::gates::{self, GateResult};
use crate::indicators;
use crate::risk::{self, AccountState, TradeIntent};
use crate::rules::{self, DirectionBias, SignalEvent};
use crate::setup::{Direction, SetupComposer, SetupMatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub bar_ts: DateTime<Utc>,
    pub features: CandleFeatures,
    pub context: ContextSnapshot,
    pub signals: Vec<SignalEvent>,
    pub gate_results: Vec<GateResult>,
    pub setup_matches: Vec<SetupMatch>,
    pub trade_intents: Vec<TradeIntent>,
    pub volume_guard_triggered: bool,
}

/// Run one bar through the full pipeline. Returns `None` if `history` is
/// empty — there is nothing to extract features for yet.
#[allow(clippy::too_many_arguments)]
pub fn run_pipeline(
    history: &[Bar],
    daily_history: Option<&[Bar]>,
    config: &VpaConfig,
    composer: &mut SetupComposer,
    account: &AccountState,
    id_gen: &mut IdGen,
    tf: &str,
) -> Option<PipelineResult> {
    let current = history.last()?;
    let bar_ts = current.timestamp;

    let features = features::extract_features(history, config);
    let context = context::analyze(history, config);

    if config.volume_guard.enabled {
        let prior_volumes: Vec<f64> = history[..history.len() - 1].iter().map(|b| b.volume).collect();
        let baseline = indicators::trailing_mean(&prior_volumes, config.vol.avg_window_n);
        if baseline < config.volume_guard.min_avg_volume {
            return Some(PipelineResult {
                bar_ts,
                features,
                context,
                signals: Vec::new(),
                gate_results: Vec::new(),
                setup_matches: Vec::new(),
                trade_intents: Vec::new(),
                volume_guard_triggered: true,
            });
        }
    }

    let daily_snapshot = daily_history.map(|dh| context::analyze(dh, config));

    let signals = rules::detect_all(&features, &context, config, tf, bar_ts, || {
        id_gen.next_signal_event_id()
    });

    let gate_results: Vec<GateResult> = signals
        .iter()
        .map(|signal| gates::apply_gates(signal, &context, daily_snapshot.as_ref(), &config.gates))
        .collect();

    let actionable: Vec<SignalEvent> = signals
        .iter()
        .zip(&gate_results)
        .filter(|(_, gate)| gate.actionable)
        .map(|(signal, _)| signal.clone())
        .collect();

    let setup_matches = composer.process_bar(&actionable, bar_ts, &config.setup);

    let atr = indicators::compute_atr(history, config.atr.period);
    let reference_price = current.close;

    let trade_intents: Vec<TradeIntent> = setup_matches
        .iter()
        .map(|setup_match| {
            // The setup's own direction stands in for a signal's
            // direction_bias when resolving CTX-2 alignment at the
            // trade-intent level: a LONG setup is bullish, a SHORT setup
            // bearish, independent of which specific signal confirmed it.
            let bias = match setup_match.direction {
                Direction::Long => DirectionBias::Bullish,
                Direction::Short => DirectionBias::Bearish,
            };
            let alignment = daily_snapshot
                .as_ref()
                .map(|daily| daily_context::resolve(daily, bias))
                .unwrap_or(crate::context::DominantAlignment::Unknown);
            risk::evaluate_risk(
                setup_match,
                reference_price,
                atr,
                alignment,
                config.gates.ctx2_dominant_alignment_policy,
                account,
                &config.risk,
                &config.atr,
            )
        })
        .collect();

    Some(PipelineResult {
        bar_ts,
        features,
        context,
        signals,
        gate_results,
        setup_matches,
        trade_intents,
        volume_guard_triggered: false,
    })
}
