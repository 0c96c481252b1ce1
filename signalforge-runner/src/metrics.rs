//! Performance metrics: pure functions over closed trades and the
//! balance curve.

use serde::{Deserialize, Serialize};
use signalforge_core::domain::{Direction, Trade, TradeStatus};

/// Cap applied when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Aggregate statistics for one backtest run. Only closed trades count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_pnl: f64,
    /// Peak-to-trough decline of the balance, in percent.
    pub max_drawdown_pct: f64,
    pub buy_trades: usize,
    pub sell_trades: usize,
    pub buy_wins: usize,
    pub sell_wins: usize,
    /// Percent of closed trades that were wins.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_holding_bars: f64,
    /// Trades whose stop reached the breakeven lock.
    pub locked_trades: usize,
}

impl TradeStats {
    pub fn compute(trades: &[Trade], equity_curve: &[f64]) -> Self {
        let closed: Vec<&Trade> = trades.iter().filter(|t| !t.is_open()).collect();

        let wins = count(&closed, |t| t.status == TradeStatus::ClosedWin);
        let losses = count(&closed, |t| t.status == TradeStatus::ClosedLoss);
        let (gross_profit, gross_loss) = gross(&closed);

        Self {
            total_trades: closed.len(),
            wins,
            losses,
            breakevens: count(&closed, |t| t.status == TradeStatus::ClosedBreakeven),
            gross_profit,
            gross_loss,
            net_pnl: closed.iter().map(|t| t.realized_pnl).sum(),
            max_drawdown_pct: max_drawdown_pct(equity_curve),
            buy_trades: count(&closed, |t| t.direction == Direction::Long),
            sell_trades: count(&closed, |t| t.direction == Direction::Short),
            buy_wins: count(&closed, |t| t.direction == Direction::Long && t.is_winner()),
            sell_wins: count(&closed, |t| t.direction == Direction::Short && t.is_winner()),
            win_rate: pct(wins, closed.len()),
            profit_factor: profit_factor(gross_profit, gross_loss),
            avg_win: mean(closed.iter().filter(|t| t.is_winner()).map(|t| t.realized_pnl)),
            avg_loss: mean(closed.iter().filter(|t| t.is_loser()).map(|t| t.realized_pnl)),
            avg_holding_bars: mean(closed.iter().map(|t| t.holding_bars() as f64)),
            locked_trades: count(&closed, |t| !t.stop_adjustments.is_empty()),
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.net_pnl > 0.0
    }
}

// ─── Individual metric functions ────────────────────────────────────

fn count(trades: &[&Trade], pred: impl Fn(&Trade) -> bool) -> usize {
    trades.iter().filter(|&&t| pred(t)).count()
}

/// Sum of winning P&L and absolute sum of losing P&L.
fn gross(trades: &[&Trade]) -> (f64, f64) {
    trades.iter().fold((0.0, 0.0), |(profit, loss), t| {
        if t.realized_pnl > 0.0 {
            (profit + t.realized_pnl, loss)
        } else {
            (profit, loss - t.realized_pnl)
        }
    })
}

/// Gross profit / gross loss, capped at [`PROFIT_FACTOR_CAP`].
///
/// With no losses: the cap if anything was won, otherwise 0.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

/// Maximum drawdown of a balance curve as a positive percentage.
///
/// Returns 0.0 for constant or monotonically increasing curves.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak * 100.0);
        }
    }
    max_dd
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use signalforge_core::domain::{ExitReason, Signal, SignalContext, TradeId};

    fn closed_trade(direction: Direction, exit: f64, bars_held: usize) -> Trade {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let signal = Signal {
            symbol: "EURUSD=X".into(),
            direction,
            bar_index: 10,
            timestamp: ts,
            entry: 1.0,
            stop: 1.0 - direction.sign() * 0.01,
            target: 1.0 + direction.sign() * 0.025,
            entry_min: 1.0,
            entry_max: 1.0,
            size: 5_000.0,
            score: 5.0,
            context: SignalContext {
                rsi: 40.0,
                adx: 30.0,
                atr: 0.005,
                ema_200: 1.0,
            },
        };
        let mut trade = Trade::open(TradeId::for_backtest("EURUSD=X", 10), &signal);
        let reason = if direction.favorable_move(1.0, exit) > 0.0 {
            ExitReason::TargetHit
        } else {
            ExitReason::StopHit
        };
        trade.close(exit, reason, 10 + bars_held, ts);
        trade
    }

    #[test]
    fn counts_and_breakdown() {
        let trades = vec![
            closed_trade(Direction::Long, 1.025, 4),  // +125
            closed_trade(Direction::Long, 0.99, 2),   // -50
            closed_trade(Direction::Short, 0.975, 6), // +125
            closed_trade(Direction::Short, 1.0005, 8), // breakeven, -2.5
        ];
        let stats = TradeStats::compute(&trades, &[20_000.0, 20_125.0, 20_075.0, 20_200.0]);

        assert_eq!(stats.total_trades, 4);
        assert_eq!((stats.wins, stats.losses, stats.breakevens), (2, 1, 1));
        assert_eq!((stats.buy_trades, stats.sell_trades), (2, 2));
        assert_eq!((stats.buy_wins, stats.sell_wins), (1, 1));
        assert!((stats.win_rate - 50.0).abs() < 1e-9);
        assert!((stats.gross_profit - 250.0).abs() < 1e-6);
        assert!((stats.gross_loss - 52.5).abs() < 1e-6);
        assert!((stats.net_pnl - 197.5).abs() < 1e-6);
        assert!((stats.avg_holding_bars - 5.0).abs() < 1e-9);
        assert!((stats.avg_loss + 50.0).abs() < 1e-6);
    }

    #[test]
    fn profit_factor_edge_cases() {
        assert_eq!(profit_factor(0.0, 0.0), 0.0);
        assert_eq!(profit_factor(10.0, 0.0), PROFIT_FACTOR_CAP);
        assert!((profit_factor(150.0, 100.0) - 1.5).abs() < 1e-12);
        assert_eq!(profit_factor(1e6, 1.0), PROFIT_FACTOR_CAP);
    }

    #[test]
    fn drawdown_from_running_peak() {
        let curve = [100.0, 120.0, 90.0, 130.0, 117.0];
        assert!((max_drawdown_pct(&curve) - 25.0).abs() < 1e-9);
        assert_eq!(max_drawdown_pct(&[100.0, 101.0, 102.0]), 0.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
    }

    #[test]
    fn open_trades_are_ignored() {
        let mut open = closed_trade(Direction::Long, 1.025, 1);
        open.status = TradeStatus::Open;
        let stats = TradeStats::compute(&[open], &[]);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.win_rate, 0.0);
    }
}
