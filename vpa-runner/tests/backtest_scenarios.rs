//! Full backtest-driver round trips: a bar series goes in, a closed
//! `TradeRecord` with specific entry/stop/exit numbers comes out. Complements
//! `vpa-core`'s pipeline-only scenarios by exercising next-bar-open fills,
//! slippage, and stop-touch exits, which only the driver implements.

use chrono::{DateTime, TimeZone, Utc};

use vpa_core::config::VpaConfig;
use vpa_core::domain::Bar;
use vpa_core::setup::Direction;
use vpa_runner::run_backtest;

fn ts(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::days(day)
}

fn bar(day: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        symbol: "SPY".to_string(),
        timestamp: ts(day),
        open,
        high,
        low,
        close,
        volume,
        bar_index: Some(day as u64),
    }
}

fn rising_bar(i: i64) -> Bar {
    let drift = i as f64 * 0.01;
    bar(i, 100.0 + drift, 102.0 + drift, 99.0 + drift, 101.0 + drift, 100_000.0)
}

/// A shooting-star shaped, ultra-high-volume bar fires `CLIMAX-SELL-1` and
/// opens an `ENTRY-SHORT-1` candidate; the same shape at ordinary volume on
/// the next bar fires `WEAK-1` and completes it. The driver fills the
/// resulting short at the following bar's open, then closes it the moment a
/// later bar's high touches the bar-extreme stop.
#[test]
fn entry_short_1_completes_fills_and_exits_on_stop_touch() {
    let config = VpaConfig::default();
    let mut bars: Vec<Bar> = (0..18).map(rising_bar).collect();
    bars.push(bar(18, 100.0, 102.0, 98.5, 99.5, 300_000.0)); // CLIMAX-SELL-1 trigger
    bars.push(bar(19, 100.0, 102.0, 98.5, 99.5, 100_000.0)); // WEAK-1 confirm
    bars.push(bar(20, 100.0, 101.0, 99.0, 100.5, 100_000.0)); // fills short at this bar's open
    bars.push(bar(21, 100.0, 103.0, 99.0, 101.0, 100_000.0)); // high touches the 102.0 stop

    let result = run_backtest("SPY", "1D", &bars, None, &config, 100_000.0);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.setup_name, "ENTRY-SHORT-1");
    assert_eq!(trade.direction, Direction::Short);
    assert_eq!(trade.stop_price, 102.0);
    assert_eq!(trade.quantity, 200);
    assert!((trade.entry_price - 99.95).abs() < 1e-9);
    assert!((trade.exit_price - 101.949).abs() < 1e-6);
    assert!(trade.pnl < 0.0);
    assert_eq!(trade.entry_ts, ts(20));
    assert_eq!(trade.exit_ts, ts(21));
}

/// Same fixture, run twice: the backtest driver must produce byte-identical
/// trade records and final equity both times.
#[test]
fn entry_short_1_backtest_is_deterministic() {
    let config = VpaConfig::default();
    let mut bars: Vec<Bar> = (0..18).map(rising_bar).collect();
    bars.push(bar(18, 100.0, 102.0, 98.5, 99.5, 300_000.0));
    bars.push(bar(19, 100.0, 102.0, 98.5, 99.5, 100_000.0));
    bars.push(bar(20, 100.0, 101.0, 99.0, 100.5, 100_000.0));
    bars.push(bar(21, 100.0, 103.0, 99.0, 101.0, 100_000.0));

    let a = run_backtest("SPY", "1D", &bars, None, &config, 100_000.0);
    let b = run_backtest("SPY", "1D", &bars, None, &config, 100_000.0);

    assert_eq!(a.trades, b.trades);
    assert_eq!(a.stats.final_equity, b.stats.final_equity);
}

/// A daily loss limit configured tight enough to have already been
/// breached by an earlier loss blocks every later entry for the rest of
/// that calendar day, then the limit resets and a new position is free to
/// open the following day.
#[test]
fn daily_loss_limit_blocks_new_entries_for_the_rest_of_the_day() {
    let mut config = VpaConfig::default();
    config.risk.daily_loss_limit_pct = Some(0.001); // 0.1% of equity, trivially breached

    let mut bars: Vec<Bar> = (0..18).map(rising_bar).collect();
    bars.push(bar(18, 100.0, 102.0, 98.5, 99.5, 300_000.0));
    bars.push(bar(19, 100.0, 102.0, 98.5, 99.5, 100_000.0));
    bars.push(bar(20, 100.0, 101.0, 99.0, 100.5, 100_000.0));
    bars.push(bar(21, 100.0, 103.0, 99.0, 101.0, 100_000.0)); // stops out, books a loss same day

    // A second trigger/confirm pair later the same calendar day: since the
    // first loss already exceeds the 0.1% limit, the Risk Engine must
    // reject this one outright and the driver must never open a position
    // for it.
    bars.push(bar(22, 100.0, 102.0, 98.5, 99.5, 300_000.0));
    bars.push(bar(23, 100.0, 102.0, 98.5, 99.5, 100_000.0));

    let result = run_backtest("SPY", "1D", &bars, None, &config, 100_000.0);

    assert_eq!(result.trades.len(), 1, "the same-day rejected setup must never open a position");
}
