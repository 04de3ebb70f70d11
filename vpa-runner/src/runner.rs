//! Backtest driver — the bar-by-bar event loop tying the pipeline
//! orchestrator to a single-position, next-bar-open execution model.
//!
//! At most one position is open at a time. A `TradeIntent` that goes
//! `READY` on bar `i` fills at bar `i+1`'s open; an open position closes
//! the moment its stop is touched, checked against the current bar's
//! low (long) or high (short) before that bar's pipeline stage runs, so a
//! position can never be marked both "stopped out" and "pyramided" on the
//! same bar.

use chrono::{DateTime, Utc};

use vpa_core::config::VpaConfig;
use vpa_core::domain::{Bar, IdGen};
use vpa_core::pipeline::run_pipeline;
use vpa_core::risk::{AccountState, TradeIntentStatus};
use vpa_core::setup::{Direction, SetupComposer};

use crate::result::{BacktestResult, EquityPoint, PerformanceStats, TradeRecord};

struct OpenPosition {
    setup_name: String,
    direction: Direction,
    entry_ts: DateTime<Utc>,
    entry_price: f64,
    stop_price: f64,
    quantity: u64,
}

fn apply_slippage(price: f64, direction: Direction, is_entry: bool, slippage: f64) -> f64 {
    let adverse = match (direction, is_entry) {
        (Direction::Long, true) | (Direction::Short, false) => 1.0 + slippage,
        (Direction::Long, false) | (Direction::Short, true) => 1.0 - slippage,
    };
    price * adverse
}

fn close_position(
    position: OpenPosition,
    exit_ts: DateTime<Utc>,
    exit_price: f64,
    symbol: &str,
) -> (TradeRecord, f64) {
    let notional = position.entry_price * position.quantity as f64;
    let pnl = match position.direction {
        Direction::Long => (exit_price - position.entry_price) * position.quantity as f64,
        Direction::Short => (position.entry_price - exit_price) * position.quantity as f64,
    };
    let return_pct = if notional != 0.0 { pnl / notional * 100.0 } else { 0.0 };
    let record = TradeRecord {
        symbol: symbol.to_string(),
        setup_name: position.setup_name,
        direction: position.direction,
        entry_ts: position.entry_ts,
        entry_price: position.entry_price,
        stop_price: position.stop_price,
        exit_ts,
        exit_price,
        quantity: position.quantity,
        pnl,
        return_pct,
    };
    (record, pnl)
}

/// Run a full single-symbol backtest over `bars`. `daily_bars`, if given,
/// feeds the Daily-Context Resolver via CTX-2 — only bars strictly at or
/// before the intraday bar's timestamp are ever visible to it.
pub fn run_backtest(
    symbol: &str,
    tf: &str,
    bars: &[Bar],
    daily_bars: Option<&[Bar]>,
    config: &VpaConfig,
    initial_equity: f64,
) -> BacktestResult {
    let mut composer = SetupComposer::new();
    let mut id_gen = IdGen::default();
    let mut equity = initial_equity;
    let mut open_position: Option<OpenPosition> = None;
    let mut pending_ready: Option<(String, Direction, f64, u64)> = None;
    let mut equity_curve = Vec::new();
    let mut trades = Vec::new();
    let mut current_day: Option<chrono::NaiveDate> = None;
    let mut daily_pnl = 0.0;

    for i in 0..bars.len() {
        let current = &bars[i];
        let history = &bars[..=i];

        let bar_day = current.timestamp.date_naive();
        if current_day != Some(bar_day) {
            current_day = Some(bar_day);
            daily_pnl = 0.0;
        }

        if let Some((setup_name, direction, stop_price, quantity)) = pending_ready.take() {
            if open_position.is_none() {
                let fill_price = apply_slippage(current.open, direction, true, config.slippage.value);
                open_position = Some(OpenPosition {
                    setup_name,
                    direction,
                    entry_ts: current.timestamp,
                    entry_price: fill_price,
                    stop_price,
                    quantity,
                });
            }
        }

        if let Some(position) = &open_position {
            let stopped = match position.direction {
                Direction::Long => current.low <= position.stop_price,
                Direction::Short => current.high >= position.stop_price,
            };
            if stopped {
                let exit_price =
                    apply_slippage(position.stop_price, position.direction, false, config.slippage.value);
                let position = open_position.take().unwrap();
                let (record, pnl) = close_position(position, current.timestamp, exit_price, symbol);
                equity += pnl;
                daily_pnl += pnl;
                trades.push(record);
            }
        }

        let daily_history = daily_bars.map(|full| {
            full.iter()
                .take_while(|b| b.timestamp <= current.timestamp)
                .cloned()
                .collect::<Vec<_>>()
        });

        let account = AccountState {
            equity,
            open_positions: if open_position.is_some() { 1 } else { 0 },
            daily_pnl,
        };

        let result = run_pipeline(
            history,
            daily_history.as_deref(),
            config,
            &mut composer,
            &account,
            &mut id_gen,
            tf,
        );

        if let Some(result) = result {
            equity_curve.push(EquityPoint {
                ts: current.timestamp,
                equity,
            });

            if open_position.is_none() && pending_ready.is_none() {
                if let Some(ready) = result
                    .trade_intents
                    .iter()
                    .find(|intent| intent.status == TradeIntentStatus::Ready)
                {
                    let entry_plan = ready.entry_plan.as_ref().expect("READY intent carries an entry plan");
                    let risk_plan = ready.risk_plan.as_ref().expect("READY intent carries a risk plan");
                    pending_ready = Some((
                        ready.setup_name.to_string(),
                        entry_plan.direction,
                        entry_plan.stop_price,
                        risk_plan.position_size,
                    ));
                }
            }
        }
    }

    if let Some(position) = open_position.take() {
        let last = bars.last().expect("loop ran at least once if a position is open");
        let exit_price = apply_slippage(last.close, position.direction, false, config.slippage.value);
        let (record, pnl) = close_position(position, last.timestamp, exit_price, symbol);
        equity += pnl;
        trades.push(record);
        if let Some(last_point) = equity_curve.last_mut() {
            last_point.equity = equity;
        } else {
            equity_curve.push(EquityPoint {
                ts: last.timestamp,
                equity,
            });
        }
    }

    let stats = PerformanceStats::from_results(&equity_curve, &trades, initial_equity);
    BacktestResult {
        config_hash: vpa_core::config::fingerprint(config),
        equity_curve,
        trades,
        stats,
    }
}
