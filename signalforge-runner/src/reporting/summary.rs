//! Plain-text backtest summary and the 0-5 star rating.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::metrics::TradeStats;
use crate::runner::BacktestResult;
use crate::sweep::GridReport;

const RULE: &str = "============================================================";

/// Which rating criteria a run meets. One star each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCriteria {
    pub win_rate: bool,
    pub profit_factor: bool,
    pub drawdown: bool,
    pub profitable: bool,
    pub enough_trades: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub stars: u8,
    pub criteria: RatingCriteria,
}

impl Rating {
    pub const MIN_WIN_RATE: f64 = 50.0;
    pub const MIN_PROFIT_FACTOR: f64 = 1.5;
    pub const MAX_DRAWDOWN_PCT: f64 = 20.0;
    pub const MIN_TRADES: usize = 20;

    pub fn from_stats(stats: &TradeStats) -> Self {
        let criteria = RatingCriteria {
            win_rate: stats.win_rate >= Self::MIN_WIN_RATE,
            profit_factor: stats.profit_factor >= Self::MIN_PROFIT_FACTOR,
            drawdown: stats.max_drawdown_pct < Self::MAX_DRAWDOWN_PCT,
            profitable: stats.net_pnl > 0.0,
            enough_trades: stats.total_trades >= Self::MIN_TRADES,
        };
        let stars = [
            criteria.win_rate,
            criteria.profit_factor,
            criteria.drawdown,
            criteria.profitable,
            criteria.enough_trades,
        ]
        .iter()
        .filter(|&&met| met)
        .count() as u8;
        Self { stars, criteria }
    }

    pub fn label(&self) -> &'static str {
        match self.stars {
            5 => "EXCELLENT - ready for live testing",
            4 => "GOOD - minor refinements needed",
            3 => "MODERATE - some improvements needed",
            2 => "WEAK - significant changes required",
            1 => "POOR - strategy needs rework",
            _ => "FAILING - do not use",
        }
    }
}

fn mark(met: bool) -> &'static str {
    if met {
        "yes"
    } else {
        "no"
    }
}

/// Render the end-of-run summary.
pub fn render_summary(result: &BacktestResult) -> String {
    let s = &result.stats;
    let mut out = String::with_capacity(1024);

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "  BACKTEST RESULTS  {}", result.symbol);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "  Params:          {}", result.params);
    let _ = writeln!(out, "  Bars:            {} ({} signals)", result.bar_count, result.signal_count);
    let _ = writeln!(out, "  Dataset:         {}", result.dataset_hash);
    let _ = writeln!(out);

    if s.total_trades == 0 {
        let _ = writeln!(out, "  No trades taken. Parameters may be too restrictive.");
        return out;
    }

    let net_pct = if result.initial_capital > 0.0 {
        s.net_pnl / result.initial_capital * 100.0
    } else {
        0.0
    };
    let _ = writeln!(out, "  Final balance:   {:.2}", result.final_balance);
    let _ = writeln!(out, "  Total P/L:       {:+.2} ({:+.1}%)", s.net_pnl, net_pct);
    let _ = writeln!(out, "  Max drawdown:    {:.1}%", s.max_drawdown_pct);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Total trades:    {}", s.total_trades);
    let _ = writeln!(out, "  Wins:            {} ({:.1}%)", s.wins, s.win_rate);
    let _ = writeln!(out, "  Losses:          {}", s.losses);
    let _ = writeln!(out, "  Breakeven:       {}", s.breakevens);
    let _ = writeln!(out, "  Avg win:         {:+.2}", s.avg_win);
    let _ = writeln!(out, "  Avg loss:        {:.2}", s.avg_loss);
    let _ = writeln!(out, "  Profit factor:   {:.2}", s.profit_factor);
    let _ = writeln!(out, "  BUY trades:      {} ({} wins)", s.buy_trades, s.buy_wins);
    let _ = writeln!(out, "  SELL trades:     {} ({} wins)", s.sell_trades, s.sell_wins);
    let _ = writeln!(out, "  Avg holding:     {:.0} bars", s.avg_holding_bars);
    let _ = writeln!(out, "  Stops locked:    {}", s.locked_trades);
    if let Some(open) = &result.open_trade {
        let _ = writeln!(
            out,
            "  Still open:      {} {} @ {:.5} (not counted)",
            open.direction, open.symbol, open.entry_price
        );
    }

    let rating = Rating::from_stats(s);
    let c = rating.criteria;
    let _ = writeln!(out);
    let _ = writeln!(out, "  Rating: {}/5 {}", rating.stars, rating.label());
    let _ = writeln!(out, "    Win rate >= 50%:       {}", mark(c.win_rate));
    let _ = writeln!(out, "    Profit factor >= 1.5:  {}", mark(c.profit_factor));
    let _ = writeln!(out, "    Max drawdown < 20%:    {}", mark(c.drawdown));
    let _ = writeln!(out, "    Profitable:            {}", mark(c.profitable));
    let _ = writeln!(out, "    Enough trades (20+):   {}", mark(c.enough_trades));
    out
}

/// Render the top `n` grid entries as a table.
pub fn render_grid_summary(report: &GridReport, n: usize) -> String {
    let mut out = String::with_capacity(256 + n * 128);
    let qualified = report.entries.iter().filter(|e| e.qualified).count();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "  GRID SEARCH  {}  {} combinations, {} with >= {} trades, {} profitable",
        report.symbol,
        report.len(),
        qualified,
        report.min_trades,
        report.profitable().len()
    );
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "  {:>4}  {:>6}  {:>6}  {:>9}  {:>6}  {:>5}  params",
        "#", "trades", "PF", "net", "DD%", "win%"
    );
    for (rank, e) in report.top(n).into_iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>4}  {:>6}  {:>6.2}  {:>+9.2}  {:>6.1}  {:>5.1}  {}",
            rank + 1,
            e.stats.total_trades,
            e.stats.profit_factor,
            e.stats.net_pnl,
            e.stats.max_drawdown_pct,
            e.stats.win_rate,
            e.params
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(win_rate: f64, pf: f64, dd: f64, net: f64, trades: usize) -> TradeStats {
        TradeStats {
            win_rate,
            profit_factor: pf,
            max_drawdown_pct: dd,
            net_pnl: net,
            total_trades: trades,
            ..TradeStats::default()
        }
    }

    #[test]
    fn all_criteria_give_five_stars() {
        let r = Rating::from_stats(&stats(55.0, 1.8, 5.0, 400.0, 30));
        assert_eq!(r.stars, 5);
        assert!(r.label().starts_with("EXCELLENT"));
    }

    #[test]
    fn boundaries_follow_the_criteria() {
        // 50% and 1.5 meet the bar; 20% drawdown does not.
        let r = Rating::from_stats(&stats(50.0, 1.5, 20.0, 0.0, 19));
        assert_eq!(r.stars, 2);
        assert!(!r.criteria.drawdown);
        assert!(!r.criteria.profitable);
        assert!(!r.criteria.enough_trades);
        assert!(r.label().starts_with("WEAK"));
    }

    #[test]
    fn nothing_met_is_failing() {
        let r = Rating::from_stats(&stats(0.0, 0.0, 35.0, -100.0, 0));
        assert_eq!(r.stars, 0);
        assert!(r.label().starts_with("FAILING"));
    }
}
