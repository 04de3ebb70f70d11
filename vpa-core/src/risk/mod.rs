//! Risk Engine — turns a completed `SetupMatch` into a `TradeIntent`: stop
//! placement (ATR-based when enabled, bar-extreme-based otherwise),
//! counter-trend position-size reduction, and floor-based unit sizing.
//! Hard rejects (concurrency cap, daily-loss limit, degenerate stop)
//! short-circuit before any sizing arithmetic runs. Sizing itself floors to
//! a minimum of one unit regardless of equity sign, so a zero or negative
//! equity account still gets a (minimal) sized trade rather than a reject.

use serde::{Deserialize, Serialize};

use crate::config::{AtrConfig, Ctx2Policy, RiskConfig};
use crate::context::DominantAlignment;
use crate::setup::{Direction, SetupMatch};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub equity: f64,
    pub open_positions: u32,
    pub daily_pnl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeIntentStatus {
    Ready,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPlan {
    pub direction: Direction,
    pub reference_price: f64,
    pub stop_price: f64,
    pub atr_based_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPlan {
    pub risk_per_unit: f64,
    pub risk_pct: f64,
    pub position_size: u64,
    pub risk_amount: f64,
    pub countertrend: bool,
}

/// `rationale` is the audit chain: one entry per stage annotation (stop
/// basis, countertrend reduction, rejection reason). Appended to, never
/// rewritten, so a reader can trace why a trade did or didn't happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub setup_name: &'static str,
    pub status: TradeIntentStatus,
    pub reject_reasons: Vec<String>,
    pub rationale: Vec<String>,
    pub entry_plan: Option<EntryPlan>,
    pub risk_plan: Option<RiskPlan>,
}

impl TradeIntent {
    fn rejected(setup_name: &'static str, reasons: Vec<String>) -> Self {
        Self {
            setup_name,
            status: TradeIntentStatus::Rejected,
            reject_reasons: reasons,
            rationale: Vec::new(),
            entry_plan: None,
            risk_plan: None,
        }
    }
}

/// Build a `TradeIntent` for a completed setup. `reference_price` is the
/// confirmation bar's close, the anchor both the ATR stop offset and the
/// bar-based stop fallback are measured from. `alignment` is the setup
/// direction's dominant alignment against the daily timeframe (resolved by
/// the caller via the Daily-Context Resolver); it only affects sizing when
/// `ctx2_policy` is `REDUCE_RISK` — under `ALLOW`/`DISALLOW` the Context
/// Gates already decided the outcome and the Risk Engine adds no annotation.
pub fn evaluate_risk(
    setup_match: &SetupMatch,
    reference_price: f64,
    atr: f64,
    alignment: DominantAlignment,
    ctx2_policy: Ctx2Policy,
    account: &AccountState,
    config: &RiskConfig,
    atr_config: &AtrConfig,
) -> TradeIntent {
    let mut reasons = Vec::new();
    if account.open_positions >= config.max_concurrent_positions {
        reasons.push(format!(
            "max concurrent positions reached ({}/{})",
            account.open_positions, config.max_concurrent_positions
        ));
    }
    if let Some(limit_pct) = config.daily_loss_limit_pct {
        if account.daily_pnl <= -account.equity * limit_pct {
            reasons.push(format!(
                "daily loss limit reached ({:.2}% of equity)",
                limit_pct * 100.0
            ));
        }
    }
    if !reasons.is_empty() {
        return TradeIntent::rejected(setup_match.name, reasons);
    }

    let atr_based_stop = atr_config.enabled && atr > 0.0;
    let mut used_fallback = false;
    let stop_price = match (setup_match.direction, atr_based_stop) {
        (Direction::Long, true) => reference_price - atr * atr_config.stop_multiplier,
        (Direction::Long, false) => {
            if setup_match.trigger_bar_low > 0.0 && setup_match.trigger_bar_low < reference_price {
                setup_match.trigger_bar_low
            } else {
                used_fallback = true;
                reference_price * 0.98
            }
        }
        (Direction::Short, true) => reference_price + atr * atr_config.stop_multiplier,
        (Direction::Short, false) => {
            if setup_match.trigger_bar_high > 0.0 && setup_match.trigger_bar_high > reference_price {
                setup_match.trigger_bar_high
            } else {
                used_fallback = true;
                reference_price * 1.02
            }
        }
    };
    let mut rationale = vec![if atr_based_stop {
        "stop basis: ATR".to_string()
    } else if used_fallback {
        "stop basis: bar extreme (fallback, trigger bar extreme unusable)".to_string()
    } else {
        "stop basis: bar extreme".to_string()
    }];

    let risk_per_unit = (reference_price - stop_price).abs();
    if risk_per_unit <= 0.0 {
        return TradeIntent::rejected(
            setup_match.name,
            vec!["risk per unit is zero".to_string()],
        );
    }

    let countertrend = ctx2_policy == Ctx2Policy::ReduceRisk && alignment == DominantAlignment::Against;
    let risk_pct = if countertrend {
        rationale.push("CTX-2:AGAINST(risk_reduced)".to_string());
        config.risk_pct_per_trade * config.countertrend_multiplier
    } else if ctx2_policy == Ctx2Policy::ReduceRisk && alignment == DominantAlignment::With {
        rationale.push("CTX-2:WITH".to_string());
        config.risk_pct_per_trade
    } else {
        config.risk_pct_per_trade
    };
    let risk_amount = account.equity * risk_pct;
    let position_size = ((risk_amount / risk_per_unit).floor() as u64).max(1);

    TradeIntent {
        setup_name: setup_match.name,
        status: TradeIntentStatus::Ready,
        reject_reasons: Vec::new(),
        rationale,
        entry_plan: Some(EntryPlan {
            direction: setup_match.direction,
            reference_price,
            stop_price,
            atr_based_stop,
        }),
        risk_plan: Some(RiskPlan {
            risk_per_unit,
            risk_pct,
            position_size,
            risk_amount,
            countertrend,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Ctx2Policy;
    use chrono::{TimeZone, Utc};

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    fn long_match() -> SetupMatch {
        SetupMatch {
            name: "ENTRY-LONG-1",
            direction: Direction::Long,
            trigger_ts: ts(),
            confirm_ts: ts(),
            trigger_bar_low: 98.5,
            trigger_bar_high: 101.0,
        }
    }

    fn account() -> AccountState {
        AccountState {
            equity: 100_000.0,
            open_positions: 0,
            daily_pnl: 0.0,
        }
    }

    fn risk_cfg() -> RiskConfig {
        RiskConfig {
            risk_pct_per_trade: 0.005,
            max_concurrent_positions: 1,
            countertrend_multiplier: 0.5,
            daily_loss_limit_pct: None,
        }
    }

    fn atr_cfg_disabled() -> AtrConfig {
        AtrConfig {
            period: 14,
            stop_multiplier: 2.0,
            enabled: false,
        }
    }

    #[test]
    fn happy_path_long_bar_based_stop() {
        // equity=100_000, reference=100.0, bar-based stop=98.5, risk_per_unit=1.5
        // risk_amount = 500, size = floor(500/1.5) = 333
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Ready);
        let plan = intent.risk_plan.unwrap();
        assert_eq!(plan.position_size, 333);
        assert!(!plan.countertrend);
    }

    #[test]
    fn entry_long_1_worked_example_sizes_to_58() {
        // confirmation bar close=107 as reference, bar-based stop=98.5
        // risk_amount = 100_000 * 0.005 = 500, size = floor(500/8.5) = 58
        let intent = evaluate_risk(
            &long_match(),
            107.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Ready);
        assert_eq!(intent.risk_plan.as_ref().unwrap().position_size, 58);
        assert_eq!(intent.entry_plan.unwrap().stop_price, 98.5);
    }

    #[test]
    fn rejects_when_max_concurrent_reached() {
        let mut acct = account();
        acct.open_positions = 1;
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &acct,
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Rejected);
    }

    #[test]
    fn rejects_when_daily_loss_limit_breached() {
        let mut cfg = risk_cfg();
        cfg.daily_loss_limit_pct = Some(0.02);
        let mut acct = account();
        acct.daily_pnl = -2_500.0; // 2.5% of 100_000 equity, past a 2% limit
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &acct,
            &cfg,
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Rejected);
        assert!(intent.reject_reasons[0].contains("daily loss limit"));
    }

    #[test]
    fn daily_loss_under_limit_does_not_reject() {
        let mut cfg = risk_cfg();
        cfg.daily_loss_limit_pct = Some(0.02);
        let mut acct = account();
        acct.daily_pnl = -500.0;
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &acct,
            &cfg,
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Ready);
    }

    #[test]
    fn zero_equity_still_sizes_to_the_one_unit_floor() {
        let mut acct = account();
        acct.equity = 0.0;
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &acct,
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Ready);
        assert_eq!(intent.risk_plan.unwrap().position_size, 1);
    }

    #[test]
    fn negative_equity_still_sizes_to_the_one_unit_floor() {
        let mut acct = account();
        acct.equity = -50_000.0;
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &acct,
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Ready);
        assert_eq!(intent.risk_plan.unwrap().position_size, 1);
    }

    #[test]
    fn atr_based_stop_used_when_enabled() {
        let mut atr_cfg = atr_cfg_disabled();
        atr_cfg.enabled = true;
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            1.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg,
        );
        let plan = intent.entry_plan.unwrap();
        assert!(plan.atr_based_stop);
        assert_eq!(plan.stop_price, 98.0);
    }

    #[test]
    fn countertrend_halves_size() {
        let plain = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        let reduced = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Against,
            Ctx2Policy::ReduceRisk,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        let plain_size = plain.risk_plan.unwrap().position_size;
        let reduced = reduced.risk_plan.unwrap();
        assert_eq!(reduced.risk_pct, 0.0025);
        assert_eq!(reduced.position_size, (plain_size as f64 * 0.5).floor() as u64);
        assert!(reduced.countertrend);
    }

    #[test]
    fn with_alignment_under_reduce_risk_annotates_but_does_not_shrink_size() {
        let plain = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        let with = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::With,
            Ctx2Policy::ReduceRisk,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(
            with.risk_plan.as_ref().unwrap().position_size,
            plain.risk_plan.unwrap().position_size
        );
        assert!(!with.risk_plan.unwrap().countertrend);
        assert!(with.rationale.iter().any(|r| r == "CTX-2:WITH"));
    }

    #[test]
    fn allow_policy_never_annotates_regardless_of_alignment() {
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Against,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert!(!intent.rationale.iter().any(|r| r.starts_with("CTX-2")));
        assert!(!intent.risk_plan.unwrap().countertrend);
    }

    #[test]
    fn falls_back_to_price_pct_when_bar_based_stop_is_on_the_wrong_side() {
        let mut bad_match = long_match();
        bad_match.trigger_bar_low = 101.0; // above reference_price for a long
        let intent = evaluate_risk(
            &bad_match,
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Ready);
        assert_eq!(intent.entry_plan.unwrap().stop_price, 98.0);
    }

    #[test]
    fn size_floors_to_at_least_one_unit() {
        let mut acct = account();
        acct.equity = 1.0;
        let intent = evaluate_risk(
            &long_match(),
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &acct,
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        assert_eq!(intent.status, TradeIntentStatus::Ready);
        assert_eq!(intent.risk_plan.unwrap().position_size, 1);
    }

    #[test]
    fn short_setup_uses_bar_high_as_bar_based_stop() {
        let short_match = SetupMatch {
            name: "ENTRY-SHORT-1",
            direction: Direction::Short,
            trigger_ts: ts(),
            confirm_ts: ts(),
            trigger_bar_low: 99.0,
            trigger_bar_high: 102.0,
        };
        let intent = evaluate_risk(
            &short_match,
            100.0,
            0.0,
            DominantAlignment::Unknown,
            Ctx2Policy::Allow,
            &account(),
            &risk_cfg(),
            &atr_cfg_disabled(),
        );
        let plan = intent.entry_plan.unwrap();
        assert_eq!(plan.stop_price, 102.0);
    }
}
