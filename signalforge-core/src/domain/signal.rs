//! Signal: a scored entry candidate that passed every rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Signed favourable move from `from` to `to`.
    pub fn favorable_move(self, from: f64, to: f64) -> f64 {
        (to - from) * self.sign()
    }

    /// True if `candidate` is a tighter (less risky) stop than `current`.
    pub fn is_tighter(self, candidate: f64, current: f64) -> bool {
        match self {
            Direction::Long => candidate > current,
            Direction::Short => candidate < current,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Long => "BUY",
            Direction::Short => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An accepted entry signal. Produced once, consumed by the risk model and
/// the trade monitor, and handed to alert/veto collaborators as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    /// Acceptable fill range around `entry`.
    pub entry_min: f64,
    pub entry_max: f64,
    /// Units to trade so that a stop-out loses exactly the risk budget.
    pub size: f64,
    pub score: f64,
    pub context: SignalContext,
}

/// Indicator readings at the signal bar, carried for alert formatting and
/// the external veto prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalContext {
    pub rsi: f64,
    pub adx: f64,
    pub atr: f64,
    pub ema_200: f64,
}

impl Signal {
    /// Initial risk distance (1R).
    pub fn risk_distance(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    pub fn reward_distance(&self) -> f64 {
        (self.target - self.entry).abs()
    }
}
