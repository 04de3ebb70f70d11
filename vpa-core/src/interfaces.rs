//! Collaborator traits the pipeline and safety layers are generic over.
//! `vpa-core` never does I/O itself — `vpa-runner` supplies file-backed
//! implementations of these; tests supply in-memory ones.

use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::risk::TradeIntent;
use crate::rules::SignalEvent;
use crate::setup::{Direction, SetupMatch};

/// Source of historical bars for a `(symbol, timeframe)` series.
pub trait BarStore {
    type Error: StdError;

    fn load(&self, symbol: &str, tf: &str) -> Result<Vec<Bar>, Self::Error>;
}

/// Tracks open positions per symbol so the Risk Engine's concurrency cap
/// has something to check against.
pub trait ExecutionLedger {
    type Error: StdError;

    fn open_position_count(&self, symbol: &str) -> Result<u32, Self::Error>;
    fn record_trade_intent(&mut self, symbol: &str, intent: &TradeIntent) -> Result<(), Self::Error>;
}

/// Append-only record of everything the pipeline decided, for replay and
/// post-hoc audit. One event per state transition — never batched, never
/// reordered relative to the bar that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VpaEvent {
    SignalDetected {
        ts: DateTime<Utc>,
        signal: SignalEvent,
    },
    GateBlocked {
        ts: DateTime<Utc>,
        signal_key: String,
        reasons: Vec<String>,
    },
    SetupOpened {
        ts: DateTime<Utc>,
        name: String,
        direction: Direction,
    },
    SetupExpired {
        ts: DateTime<Utc>,
        name: String,
    },
    SetupInvalidated {
        ts: DateTime<Utc>,
        name: String,
    },
    SetupCompleted {
        ts: DateTime<Utc>,
        setup_match: SetupMatch,
    },
    TradeIntentReady {
        ts: DateTime<Utc>,
        intent: TradeIntent,
    },
    TradeIntentRejected {
        ts: DateTime<Utc>,
        intent: TradeIntent,
    },
    SafetyHalt {
        ts: DateTime<Utc>,
        reasons: Vec<String>,
    },
    KillSwitchTripped {
        ts: DateTime<Utc>,
    },
    KillSwitchCleared {
        ts: DateTime<Utc>,
    },
}

/// Sink for `VpaEvent`s. Implementations decide durability (append to a
/// JSONL file, write to stdout, hold in memory for tests).
pub trait Journal {
    type Error: StdError;

    fn record(&mut self, event: VpaEvent) -> Result<(), Self::Error>;
}
