//! Safety Guard — the kill switch and the daily-loss halt, checked ahead of
//! every risk evaluation. The kill switch takes precedence over the
//! daily-loss halt: once tripped, the reason for the halt no longer
//! matters — nothing gets through until it's cleared.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::risk::AccountState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyResult {
    pub allowed: bool,
    pub reasons: Vec<String>,
}

impl SafetyResult {
    fn ok() -> Self {
        Self {
            allowed: true,
            reasons: Vec::new(),
        }
    }

    fn halt(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reasons: vec![reason.into()],
        }
    }
}

/// Holds the kill switch's runtime state across a session. A fresh guard
/// starts clear; the CLI's `paper`/`replay` drivers flip it on operator
/// command or on an unrecoverable journal-write failure.
///
/// `trading_date` is the calendar date the daily-loss baseline was last
/// marked against. `check`/`start_day` compare it to the date of the bar
/// being processed and reset the baseline themselves on a new day, the
/// same self-resetting discipline as the original `SafetyGuard`'s
/// `_reset_if_new_day` — callers never have to remember to reset.
#[derive(Debug, Default)]
pub struct SafetyGuard {
    kill_switch: bool,
    start_of_day_equity: Option<f64>,
    trading_date: Option<NaiveDate>,
}

impl SafetyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip_kill_switch(&mut self) {
        self.kill_switch = true;
    }

    pub fn clear_kill_switch(&mut self) {
        self.kill_switch = false;
    }

    pub fn is_kill_switched(&self) -> bool {
        self.kill_switch
    }

    fn reset_if_new_day(&mut self, today: NaiveDate, equity: f64) {
        if self.trading_date != Some(today) {
            self.start_of_day_equity = Some(equity);
            self.trading_date = Some(today);
        }
    }

    /// Mark the equity baseline for `today`'s daily-loss calculation. Safe
    /// to call on every bar; it's a no-op once `today` is already marked.
    pub fn start_day(&mut self, today: NaiveDate, equity: f64) {
        self.reset_if_new_day(today, equity);
    }

    /// Realized/unrealized loss so far today, in account currency. `None`
    /// until a day has been marked via `start_day` or `check`.
    pub fn daily_pnl(&self, current_equity: f64) -> Option<f64> {
        self.start_of_day_equity.map(|start| current_equity - start)
    }

    /// The dollar loss at which the configured daily-loss limit trips,
    /// `None` when no limit is configured or no day has been marked yet.
    pub fn max_daily_loss(&self, config: &RiskConfig) -> Option<f64> {
        let start = self.start_of_day_equity?;
        config.daily_loss_limit_pct.map(|pct| start * pct)
    }

    /// Kill switch first, daily-loss halt second — evaluated in that order
    /// so a tripped kill switch is always reported regardless of P&L. Resets
    /// the daily-loss baseline itself whenever `today` is a new calendar
    /// date relative to the last bar seen.
    pub fn check(&mut self, today: NaiveDate, account: &AccountState, config: &RiskConfig) -> SafetyResult {
        if self.kill_switch {
            return SafetyResult::halt("kill switch engaged");
        }
        self.reset_if_new_day(today, account.equity);
        if let Some(max_loss) = self.max_daily_loss(config) {
            if -account.daily_pnl >= max_loss {
                return SafetyResult::halt("daily loss limit reached");
            }
        }
        SafetyResult::ok()
    }
}
