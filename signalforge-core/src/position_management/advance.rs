//! Per-bar trade transition.

use crate::domain::{
    Bar, Direction, ExitReason, StopAdjustment, Trade, TradeId, TradeStatus, TrailingPhase,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::breakeven::TrailingRule;
use super::ratchet::RatchetState;

/// Which exit wins when one bar crosses both the stop and the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPolicy {
    /// Assume the adverse extreme came first (conservative).
    #[default]
    StopFirst,
    TargetFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TradeEvent {
    PhaseChanged {
        id: TradeId,
        from: TrailingPhase,
        to: TrailingPhase,
        at: DateTime<Utc>,
    },
    StopMoved {
        id: TradeId,
        old_stop: f64,
        new_stop: f64,
        at: DateTime<Utc>,
    },
    Closed {
        id: TradeId,
        reason: ExitReason,
        exit_price: f64,
        status: TradeStatus,
        pnl: f64,
        at: DateTime<Utc>,
    },
}

impl TradeEvent {
    pub fn trade_id(&self) -> &TradeId {
        match self {
            TradeEvent::PhaseChanged { id, .. }
            | TradeEvent::StopMoved { id, .. }
            | TradeEvent::Closed { id, .. } => id,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, TradeEvent::Closed { .. })
    }
}

/// Result of advancing one trade by one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeUpdate {
    pub trade: Trade,
    pub events: Vec<TradeEvent>,
}

impl TradeUpdate {
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn closed(&self) -> bool {
        !self.trade.is_open()
    }
}

fn stop_crossed(direction: Direction, bar: &Bar, stop: f64) -> bool {
    match direction {
        Direction::Long => bar.low <= stop,
        Direction::Short => bar.high >= stop,
    }
}

fn target_crossed(direction: Direction, bar: &Bar, target: f64) -> bool {
    match direction {
        Direction::Long => bar.high >= target,
        Direction::Short => bar.low <= target,
    }
}

fn favorable_extreme(direction: Direction, bar: &Bar) -> f64 {
    match direction {
        Direction::Long => bar.high,
        Direction::Short => bar.low,
    }
}

/// Advance `trade` through `bar`.
///
/// Order of checks:
/// 1. Exit against the stop in force at the bar's open, and the target.
///    If both are crossed, `policy` picks the exit.
/// 2. Still open: update the favourable excursion and, if it crosses a
///    threshold of `rule`, move the phase forward and ratchet the stop.
///
/// Closed trades are returned unchanged with no events.
pub fn advance_trade(
    trade: &Trade,
    bar: &Bar,
    bar_index: usize,
    rule: &TrailingRule,
    policy: IntrabarPolicy,
) -> TradeUpdate {
    let mut next = trade.clone();
    let mut events = Vec::new();

    if !trade.is_open() {
        return TradeUpdate {
            trade: next,
            events,
        };
    }

    let direction = trade.direction;
    let stop_hit = stop_crossed(direction, bar, trade.current_stop);
    let target_hit = target_crossed(direction, bar, trade.take_profit);

    let exit = match (stop_hit, target_hit, policy) {
        (true, true, IntrabarPolicy::StopFirst) | (true, false, _) => {
            Some((ExitReason::StopHit, trade.current_stop))
        }
        (true, true, IntrabarPolicy::TargetFirst) | (false, true, _) => {
            Some((ExitReason::TargetHit, trade.take_profit))
        }
        (false, false, _) => None,
    };

    if let Some((reason, price)) = exit {
        next.close(price, reason, bar_index, bar.timestamp);
        events.push(TradeEvent::Closed {
            id: next.id.clone(),
            reason,
            exit_price: price,
            status: next.status,
            pnl: next.realized_pnl,
            at: bar.timestamp,
        });
        return TradeUpdate {
            trade: next,
            events,
        };
    }

    let excursion = direction.favorable_move(trade.entry_price, favorable_extreme(direction, bar));
    if excursion > next.max_favorable_excursion {
        next.max_favorable_excursion = excursion;
    }

    let target_phase = rule.phase_for(next.excursion_r());
    if target_phase > next.phase {
        if target_phase == TrailingPhase::LockedBreakeven {
            let mut ratchet = RatchetState::new(direction, next.current_stop);
            let old_stop = next.current_stop;
            let new_stop = ratchet.apply(rule.lock_level(&next));
            if new_stop != old_stop {
                next.current_stop = new_stop;
                next.stop_adjustments.push(StopAdjustment {
                    at: bar.timestamp,
                    old_stop,
                    new_stop,
                    reason: format!("breakeven lock at {}R", rule.trigger_r()),
                });
                events.push(TradeEvent::StopMoved {
                    id: next.id.clone(),
                    old_stop,
                    new_stop,
                    at: bar.timestamp,
                });
            }
        }
        events.push(TradeEvent::PhaseChanged {
            id: next.id.clone(),
            from: next.phase,
            to: target_phase,
            at: bar.timestamp,
        });
        next.phase = target_phase;
    }

    TradeUpdate {
        trade: next,
        events,
    }
}
