//! Trade monitor: owner of open-trade state.
//!
//! Every mutation is persisted through the `TradeStore` before the monitor
//! reports success. If a save fails the in-memory state is kept, the monitor
//! is marked unconfirmed, and new trades are refused until `flush()`
//! succeeds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{Bar, Signal, Trade, TradeId, TradeStatus, TrailingPhase};
use crate::position_management::{advance_trade, IntrabarPolicy, TradeEvent, TrailingRule};

use super::store::{StoreError, TradeBook, TradeStore, HISTORY_LIMIT};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("trade state is not confirmed on disk; flush before opening new trades")]
    UnconfirmedState,

    #[error("trade {0} is already open")]
    DuplicateTrade(TradeId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Trailing-stop usage over closed trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailingStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    /// Trades whose stop was moved by the breakeven lock.
    pub activations: usize,
    /// Locked trades that closed without a loss.
    pub saved: usize,
}

impl TrailingStats {
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        let mut stats = Self::default();
        for trade in trades {
            match trade.status {
                TradeStatus::Open => continue,
                TradeStatus::ClosedWin => stats.wins += 1,
                TradeStatus::ClosedLoss => stats.losses += 1,
                TradeStatus::ClosedBreakeven => stats.breakevens += 1,
            }
            stats.total += 1;
            if trade.phase == TrailingPhase::LockedBreakeven {
                stats.activations += 1;
                if trade.status != TradeStatus::ClosedLoss {
                    stats.saved += 1;
                }
            }
        }
        stats
    }

    fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            part as f64 / total as f64 * 100.0
        }
    }

    pub fn win_rate(&self) -> f64 {
        Self::pct(self.wins, self.total)
    }

    pub fn activation_rate(&self) -> f64 {
        Self::pct(self.activations, self.total)
    }

    pub fn saved_rate(&self) -> f64 {
        Self::pct(self.saved, self.total)
    }
}

impl fmt::Display for TrailingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return writeln!(f, "No trade history yet");
        }
        writeln!(f, "Total trades:      {}", self.total)?;
        writeln!(f, "Wins:              {}", self.wins)?;
        writeln!(f, "Losses:            {}", self.losses)?;
        writeln!(f, "Breakevens:        {}", self.breakevens)?;
        writeln!(f, "Win rate:          {:.1}%", self.win_rate())?;
        writeln!(
            f,
            "Lock activated:    {} ({:.1}% of trades)",
            self.activations,
            self.activation_rate()
        )?;
        writeln!(
            f,
            "Losses avoided:    {} ({:.1}% of trades)",
            self.saved,
            self.saved_rate()
        )
    }
}

pub struct TradeMonitor<S: TradeStore> {
    store: S,
    open: BTreeMap<TradeId, Trade>,
    history: Vec<Trade>,
    rule: TrailingRule,
    policy: IntrabarPolicy,
    unconfirmed: bool,
}

impl<S: TradeStore> TradeMonitor<S> {
    /// Load persisted state once and take ownership of the store.
    pub fn load(store: S, rule: TrailingRule, policy: IntrabarPolicy) -> Result<Self, MonitorError> {
        let book = store.load()?;
        info!(
            open = book.open.len(),
            history = book.history.len(),
            "loaded trade state"
        );
        let mut monitor = Self {
            store,
            open: book.open,
            history: book.history,
            rule,
            policy,
            unconfirmed: false,
        };
        monitor.trim_history();
        Ok(monitor)
    }

    /// Keep only the most recent `HISTORY_LIMIT` closed trades.
    fn trim_history(&mut self) {
        let excess = self.history.len().saturating_sub(HISTORY_LIMIT);
        self.history.drain(..excess);
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.open.values()
    }

    pub fn get(&self, id: &TradeId) -> Option<&Trade> {
        self.open.get(id)
    }

    pub fn has_open(&self, symbol: &str) -> bool {
        self.open.values().any(|t| t.symbol == symbol)
    }

    pub fn history(&self) -> &[Trade] {
        &self.history
    }

    pub fn is_confirmed(&self) -> bool {
        !self.unconfirmed
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn stats(&self) -> TrailingStats {
        TrailingStats::from_trades(&self.history)
    }

    fn book(&self) -> TradeBook {
        TradeBook {
            open: self.open.clone(),
            history: self.history.clone(),
        }
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let book = self.book();
        match self.store.save(&book) {
            Ok(()) => {
                self.unconfirmed = false;
                Ok(())
            }
            Err(e) => {
                self.unconfirmed = true;
                warn!(error = %e, "failed to persist trade state");
                Err(e)
            }
        }
    }

    /// Record a new trade from an accepted signal.
    ///
    /// Refused while the last save failed. If this save fails the trade is
    /// dropped again and the error returned.
    pub fn open_trade(
        &mut self,
        signal: &Signal,
        opened_at: DateTime<Utc>,
    ) -> Result<TradeId, MonitorError> {
        if self.unconfirmed {
            return Err(MonitorError::UnconfirmedState);
        }
        let id = TradeId::for_live(&signal.symbol, opened_at);
        if self.open.contains_key(&id) {
            return Err(MonitorError::DuplicateTrade(id));
        }

        let mut trade = Trade::open(id.clone(), signal);
        trade.opened_at = opened_at;
        self.open.insert(id.clone(), trade);

        if let Err(e) = self.persist() {
            self.open.remove(&id);
            return Err(e.into());
        }

        info!(
            trade = %id,
            symbol = %signal.symbol,
            direction = %signal.direction,
            entry = signal.entry,
            stop = signal.stop,
            target = signal.target,
            "trade opened"
        );
        Ok(id)
    }

    /// Advance every open trade on `symbol` through `bar`.
    ///
    /// Closed trades move to history, which keeps the last
    /// `HISTORY_LIMIT` entries. State is saved when anything changed;
    /// a failed save is logged and leaves the monitor unconfirmed.
    pub fn on_bar(&mut self, symbol: &str, bar: &Bar, bar_index: usize) -> Vec<TradeEvent> {
        let ids: Vec<TradeId> = self
            .open
            .values()
            .filter(|t| t.symbol == symbol)
            .map(|t| t.id.clone())
            .collect();

        let mut events = Vec::new();
        let mut mutated = false;
        for id in ids {
            let Some(trade) = self.open.get(&id) else {
                continue;
            };
            let update = advance_trade(trade, bar, bar_index, &self.rule, self.policy);
            if update.trade != *trade {
                mutated = true;
            }
            for event in &update.events {
                log_event(event);
            }
            events.extend(update.events);

            if update.trade.is_open() {
                self.open.insert(id, update.trade);
            } else {
                self.open.remove(&id);
                self.history.push(update.trade);
            }
        }

        self.trim_history();
        if mutated {
            // Failure is recorded in `unconfirmed` and logged by `persist`.
            let _ = self.persist();
        }
        events
    }

    /// Retry persistence of the current state.
    pub fn flush(&mut self) -> Result<(), MonitorError> {
        self.persist()?;
        Ok(())
    }
}

fn log_event(event: &TradeEvent) {
    match event {
        TradeEvent::StopMoved {
            id,
            old_stop,
            new_stop,
            ..
        } => info!(trade = %id, old_stop, new_stop, "stop moved"),
        TradeEvent::PhaseChanged { id, from, to, .. } => {
            info!(trade = %id, from = ?from, to = ?to, "trailing phase changed")
        }
        TradeEvent::Closed {
            id,
            reason,
            exit_price,
            status,
            pnl,
            ..
        } => info!(
            trade = %id,
            reason = ?reason,
            exit_price,
            status = ?status,
            pnl,
            "trade closed"
        ),
    }
}
