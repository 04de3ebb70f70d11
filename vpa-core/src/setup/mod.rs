//! Setup Composer — turns sequences of `SignalEvent`s into actionable
//! `SetupMatch`es. Stateful: one composer instance owns the open
//! `SetupCandidate` registry for one symbol/timeframe for the life of a
//! session, and every bar is processed in the fixed order expire →
//! invalidate → complete → open, so a candidate opened on bar N can never
//! be completed or invalidated on the same bar it was created.
//!
//! Not `Clone`: a composer's candidate registry is the single source of
//! truth for what's open, and cloning it would let two callers disagree
//! about what's still pending. It is `Send` so the pipeline can hand it to
//! a worker thread per symbol, but never shared across threads at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SetupConfig;
use crate::rules::SignalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupCandidate {
    pub name: &'static str,
    pub direction: Direction,
    pub trigger_ts: DateTime<Utc>,
    pub trigger_bar_low: f64,
    pub trigger_bar_high: f64,
    age_bars: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupMatch {
    pub name: &'static str,
    pub direction: Direction,
    pub trigger_ts: DateTime<Utc>,
    pub confirm_ts: DateTime<Utc>,
    pub trigger_bar_low: f64,
    pub trigger_bar_high: f64,
}

struct SetupDefinition {
    name: &'static str,
    direction: Direction,
    trigger_names: &'static [&'static str],
    confirm_names: &'static [&'static str],
}

/// The three-setup registry: ENTRY-LONG-1 (support test → validation),
/// ENTRY-LONG-2 (hammer → up-bar confirmation), ENTRY-SHORT-1
/// (climax sell → a following weakness signal confirms the breakdown).
const REGISTRY: &[SetupDefinition] = &[
    SetupDefinition {
        name: "ENTRY-LONG-1",
        direction: Direction::Long,
        trigger_names: &["TEST-SUP-1"],
        confirm_names: &["VAL-1"],
    },
    SetupDefinition {
        name: "ENTRY-LONG-2",
        direction: Direction::Long,
        trigger_names: &["STR-1"],
        confirm_names: &["CONF-1"],
    },
    SetupDefinition {
        name: "ENTRY-SHORT-1",
        direction: Direction::Short,
        trigger_names: &["CLIMAX-SELL-1"],
        confirm_names: &["WEAK-1", "WEAK-2"],
    },
];

/// Signals whose presence in a bar invalidates every open LONG candidate:
/// the hard-avoidance set, plus any anomaly (priority >= 2, per the
/// composer's conservation invariant — an anomaly on the bar means the
/// setup's premise no longer holds) pointing away from the candidate's
/// direction.
fn invalidates_long(signal: &SignalEvent) -> bool {
    crate::rules::HARD_AVOIDANCE_SET.contains(&signal.name.as_str())
        || (signal.signal_class == crate::rules::SignalClass::Anomaly && signal.priority >= 2)
}

/// Signals whose presence in a bar invalidates every open SHORT candidate:
/// any Validation or Strength signal, which contradict a breakdown premise.
/// `AVOID-NEWS-1` is a LONG-only invalidator — it does not touch SHORT
/// candidates.
fn invalidates_short(signal: &SignalEvent) -> bool {
    matches!(
        signal.signal_class,
        crate::rules::SignalClass::Validation | crate::rules::SignalClass::Strength
    )
}

#[derive(Debug, Default)]
pub struct SetupComposer {
    candidates: Vec<SetupCandidate>,
}

impl SetupComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently open candidates, oldest first. Exposed for journaling and
    /// test assertions; the composer owns the only mutable view.
    pub fn open_candidates(&self) -> &[SetupCandidate] {
        &self.candidates
    }

    /// Process one bar's signals against the open registry in the fixed
    /// expire → invalidate → complete → open order, returning any
    /// `SetupMatch`es completed on this bar.
    pub fn process_bar(
        &mut self,
        signals: &[SignalEvent],
        bar_ts: DateTime<Utc>,
        config: &SetupConfig,
    ) -> Vec<SetupMatch> {
        self.expire(config.window_x);
        self.invalidate(signals);
        let matches = self.complete(signals, bar_ts);
        self.open(signals, bar_ts);
        matches
    }

    fn expire(&mut self, window_x: u64) {
        for candidate in &mut self.candidates {
            candidate.age_bars += 1;
        }
        self.candidates.retain(|c| c.age_bars <= window_x);
    }

    fn invalidate(&mut self, signals: &[SignalEvent]) {
        let long_hit = signals.iter().any(invalidates_long);
        let short_hit = signals.iter().any(invalidates_short);
        self.candidates.retain(|c| match c.direction {
            Direction::Long => !long_hit,
            Direction::Short => !short_hit,
        });
    }

    fn complete(&mut self, signals: &[SignalEvent], bar_ts: DateTime<Utc>) -> Vec<SetupMatch> {
        let mut matches = Vec::new();
        let mut completed_idx = Vec::new();
        for (idx, candidate) in self.candidates.iter().enumerate() {
            let def = REGISTRY.iter().find(|d| d.name == candidate.name);
            let Some(def) = def else { continue };
            // A candidate can't be confirmed by the same signal set that
            // opened it — age must be at least one bar old.
            if candidate.age_bars == 0 {
                continue;
            }
            if signals.iter().any(|s| def.confirm_names.contains(&s.name.as_str())) {
                matches.push(SetupMatch {
                    name: candidate.name,
                    direction: candidate.direction,
                    trigger_ts: candidate.trigger_ts,
                    confirm_ts: bar_ts,
                    trigger_bar_low: candidate.trigger_bar_low,
                    trigger_bar_high: candidate.trigger_bar_high,
                });
                completed_idx.push(idx);
            }
        }
        for idx in completed_idx.into_iter().rev() {
            self.candidates.remove(idx);
        }
        matches
    }

    fn open(&mut self, signals: &[SignalEvent], bar_ts: DateTime<Utc>) {
        for def in REGISTRY {
            if self.candidates.iter().any(|c| c.name == def.name) {
                continue;
            }
            for signal in signals {
                if def.trigger_names.contains(&signal.name.as_str()) {
                    self.candidates.push(SetupCandidate {
                        name: def.name,
                        direction: def.direction,
                        trigger_ts: bar_ts,
                        trigger_bar_low: signal.evidence.get("bar_low").copied().unwrap_or(0.0),
                        trigger_bar_high: signal.evidence.get("bar_high").copied().unwrap_or(0.0),
                        age_bars: 0,
                    });
                    break;
                }
            }
        }
    }
}
