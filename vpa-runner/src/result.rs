//! Backtest result and performance statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vpa_core::domain::ConfigHash;
use vpa_core::setup::Direction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config_hash: ConfigHash,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub stats: PerformanceStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<Utc>,
    pub equity: f64,
}

/// One closed position: filled at the bar after the `TradeIntent` went
/// `READY` (next-bar-open), closed when the stop is touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub setup_name: String,
    pub direction: Direction,
    pub entry_ts: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_price: f64,
    pub exit_ts: DateTime<Utc>,
    pub exit_price: f64,
    pub quantity: u64,
    pub pnl: f64,
    pub return_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub num_trades: usize,
    pub avg_trade_return: f64,
    pub final_equity: f64,
    pub initial_equity: f64,
}

impl PerformanceStats {
    pub fn from_results(
        equity_curve: &[EquityPoint],
        trades: &[TradeRecord],
        initial_equity: f64,
    ) -> Self {
        if equity_curve.is_empty() {
            return Self::empty(initial_equity);
        }

        let final_equity = equity_curve.last().unwrap().equity;
        let total_return = (final_equity - initial_equity) / initial_equity;

        let bar_returns: Vec<f64> = equity_curve
            .windows(2)
            .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
            .collect();

        let sharpe = compute_sharpe(&bar_returns);
        let sortino = compute_sortino(&bar_returns);
        let max_drawdown = compute_max_drawdown(equity_curve);

        let num_trades = trades.len();
        let winning: Vec<_> = trades.iter().filter(|t| t.pnl > 0.0).collect();
        let losing: Vec<_> = trades.iter().filter(|t| t.pnl <= 0.0).collect();

        let win_rate = if num_trades > 0 {
            winning.len() as f64 / num_trades as f64
        } else {
            0.0
        };

        let gross_profit: f64 = winning.iter().map(|t| t.pnl).sum();
        let gross_loss: f64 = losing.iter().map(|t| t.pnl.abs()).sum();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            0.0
        };

        let avg_trade_return = if num_trades > 0 {
            trades.iter().map(|t| t.return_pct).sum::<f64>() / num_trades as f64
        } else {
            0.0
        };

        Self {
            total_return,
            sharpe,
            sortino,
            max_drawdown,
            win_rate,
            profit_factor,
            num_trades,
            avg_trade_return,
            final_equity,
            initial_equity,
        }
    }

    fn empty(initial_equity: f64) -> Self {
        Self {
            total_return: 0.0,
            sharpe: 0.0,
            sortino: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
            profit_factor: 0.0,
            num_trades: 0,
            avg_trade_return: 0.0,
            final_equity: initial_equity,
            initial_equity,
        }
    }
}

fn compute_sharpe(bar_returns: &[f64]) -> f64 {
    if bar_returns.is_empty() {
        return 0.0;
    }
    let mean = bar_returns.iter().sum::<f64>() / bar_returns.len() as f64;
    let variance =
        bar_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / bar_returns.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev > 0.0 {
        mean / std_dev * (252.0_f64).sqrt()
    } else {
        0.0
    }
}

fn compute_sortino(bar_returns: &[f64]) -> f64 {
    if bar_returns.is_empty() {
        return 0.0;
    }
    let mean = bar_returns.iter().sum::<f64>() / bar_returns.len() as f64;
    let downside: Vec<f64> = bar_returns.iter().filter(|&&r| r < 0.0).copied().collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_variance = downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64;
    let downside_dev = downside_variance.sqrt();
    if downside_dev > 0.0 {
        mean / downside_dev * (252.0_f64).sqrt()
    } else {
        0.0
    }
}

fn compute_max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let mut peak = equity_curve[0].equity;
    let mut max_dd = 0.0;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        let dd = (peak - point.equity) / peak;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::days(day)
    }

    #[test]
    fn sharpe_is_positive_for_positive_mean_return() {
        let returns = vec![0.01, 0.02, -0.01, 0.03, 0.0, 0.01];
        assert!(compute_sharpe(&returns) > 0.0);
    }

    #[test]
    fn max_drawdown_matches_known_value() {
        let curve = vec![
            EquityPoint { ts: ts(0), equity: 100_000.0 },
            EquityPoint { ts: ts(1), equity: 110_000.0 },
            EquityPoint { ts: ts(2), equity: 90_000.0 },
            EquityPoint { ts: ts(3), equity: 95_000.0 },
        ];
        let dd = compute_max_drawdown(&curve);
        assert!((dd - 0.1818).abs() < 0.001);
    }

    #[test]
    fn stats_from_results_computes_total_return_and_win_rate() {
        let curve = vec![
            EquityPoint { ts: ts(0), equity: 100_000.0 },
            EquityPoint { ts: ts(180), equity: 110_000.0 },
            EquityPoint { ts: ts(360), equity: 120_000.0 },
        ];
        let trades = vec![TradeRecord {
            symbol: "SPY".to_string(),
            setup_name: "ENTRY-LONG-1".to_string(),
            direction: Direction::Long,
            entry_ts: ts(0),
            entry_price: 300.0,
            stop_price: 295.0,
            exit_ts: ts(180),
            exit_price: 330.0,
            quantity: 100,
            pnl: 3000.0,
            return_pct: 10.0,
        }];
        let stats = PerformanceStats::from_results(&curve, &trades, 100_000.0);
        assert_eq!(stats.total_return, 0.2);
        assert_eq!(stats.num_trades, 1);
        assert_eq!(stats.win_rate, 1.0);
    }

    #[test]
    fn empty_equity_curve_yields_zeroed_stats() {
        let stats = PerformanceStats::from_results(&[], &[], 50_000.0);
        assert_eq!(stats.final_equity, 50_000.0);
        assert_eq!(stats.num_trades, 0);
    }
}
