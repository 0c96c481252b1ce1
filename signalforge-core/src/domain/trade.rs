//! Trade: an accepted signal tracked from entry to exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TradeId;
use super::signal::{Direction, Signal};

/// A closed trade whose exit lies within this many R of entry counts as
/// breakeven rather than a win or loss.
pub const BREAKEVEN_BAND_R: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    ClosedWin,
    ClosedLoss,
    ClosedBreakeven,
}

/// Trailing-stop phase. Ordered: a trade only ever moves to a later phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingPhase {
    NotArmed,
    Armed,
    LockedBreakeven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopHit,
    TargetHit,
}

/// One recorded stop move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopAdjustment {
    pub at: DateTime<Utc>,
    pub old_stop: f64,
    pub new_stop: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub initial_stop: f64,
    pub current_stop: f64,
    pub take_profit: f64,
    /// Position size in units.
    pub size: f64,
    /// Initial risk distance (1R), fixed at entry.
    pub risk_distance: f64,
    pub score: f64,
    pub status: TradeStatus,
    pub phase: TrailingPhase,
    pub entry_bar: usize,
    pub opened_at: DateTime<Utc>,
    pub exit_bar: Option<usize>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub realized_pnl: f64,
    /// Best favourable price move seen while open, in price units.
    pub max_favorable_excursion: f64,
    #[serde(default)]
    pub stop_adjustments: Vec<StopAdjustment>,
}

impl Trade {
    /// Open a trade from an accepted signal.
    pub fn open(id: TradeId, signal: &Signal) -> Self {
        Self {
            id,
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_price: signal.entry,
            initial_stop: signal.stop,
            current_stop: signal.stop,
            take_profit: signal.target,
            size: signal.size,
            risk_distance: signal.risk_distance(),
            score: signal.score,
            status: TradeStatus::Open,
            phase: TrailingPhase::NotArmed,
            entry_bar: signal.bar_index,
            opened_at: signal.timestamp,
            exit_bar: None,
            closed_at: None,
            exit_price: None,
            exit_reason: None,
            realized_pnl: 0.0,
            max_favorable_excursion: 0.0,
            stop_adjustments: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn is_winner(&self) -> bool {
        self.status == TradeStatus::ClosedWin
    }

    pub fn is_loser(&self) -> bool {
        self.status == TradeStatus::ClosedLoss
    }

    /// Price at which the breakeven lock engages for `trigger_r`.
    pub fn trigger_price(&self, trigger_r: f64) -> f64 {
        self.entry_price + self.direction.sign() * trigger_r * self.risk_distance
    }

    /// Favourable excursion expressed in R.
    pub fn excursion_r(&self) -> f64 {
        if self.risk_distance <= 0.0 {
            return 0.0;
        }
        self.max_favorable_excursion / self.risk_distance
    }

    /// Realized result in R (0.0 while open).
    pub fn r_multiple(&self) -> f64 {
        match self.exit_price {
            Some(exit) if self.risk_distance > 0.0 => {
                self.direction.favorable_move(self.entry_price, exit) / self.risk_distance
            }
            _ => 0.0,
        }
    }

    pub fn holding_bars(&self) -> usize {
        self.exit_bar
            .map(|exit| exit.saturating_sub(self.entry_bar))
            .unwrap_or(0)
    }

    /// Close at `exit_price`. A target exit is always a win; a stop exit
    /// is classified by its distance from entry.
    pub fn close(
        &mut self,
        exit_price: f64,
        reason: ExitReason,
        bar_index: usize,
        at: DateTime<Utc>,
    ) {
        let moved = self.direction.favorable_move(self.entry_price, exit_price);
        self.status = if reason == ExitReason::TargetHit {
            TradeStatus::ClosedWin
        } else if moved.abs() <= BREAKEVEN_BAND_R * self.risk_distance {
            TradeStatus::ClosedBreakeven
        } else if moved > 0.0 {
            TradeStatus::ClosedWin
        } else {
            TradeStatus::ClosedLoss
        };
        self.realized_pnl = moved * self.size;
        self.exit_price = Some(exit_price);
        self.exit_reason = Some(reason);
        self.exit_bar = Some(bar_index);
        self.closed_at = Some(at);
    }
}
