//! JSON and CSV export of backtest results and grid rankings.
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use signalforge_core::domain::Trade;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::GridReport;

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade tape, one row per trade.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "symbol",
        "direction",
        "entry_bar",
        "opened_at",
        "entry_price",
        "initial_stop",
        "final_stop",
        "take_profit",
        "size",
        "score",
        "exit_bar",
        "closed_at",
        "exit_price",
        "exit_reason",
        "status",
        "pnl",
        "r_multiple",
        "max_excursion_r",
        "stop_moves",
    ])?;

    for t in trades {
        wtr.write_record([
            t.id.as_str(),
            &t.symbol,
            t.direction.label(),
            &t.entry_bar.to_string(),
            &t.opened_at.to_rfc3339(),
            &format!("{:.5}", t.entry_price),
            &format!("{:.5}", t.initial_stop),
            &format!("{:.5}", t.current_stop),
            &format!("{:.5}", t.take_profit),
            &format!("{:.4}", t.size),
            &format!("{:.1}", t.score),
            &t.exit_bar.map(|b| b.to_string()).unwrap_or_default(),
            &t.closed_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
            &t.exit_price.map(|p| format!("{p:.5}")).unwrap_or_default(),
            &t.exit_reason.map(|r| format!("{r:?}")).unwrap_or_default(),
            &format!("{:?}", t.status),
            &format!("{:.2}", t.realized_pnl),
            &format!("{:.2}", t.r_multiple()),
            &format!("{:.2}", t.excursion_r()),
            &t.stop_adjustments.len().to_string(),
        ])?;
    }

    finish(wtr)
}

/// Balance after each bar.
pub fn export_equity_csv(equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "balance"])?;
    for (i, balance) in equity_curve.iter().enumerate() {
        wtr.write_record([&i.to_string(), &format!("{balance:.2}")])?;
    }
    finish(wtr)
}

/// Grid entries in ranking order.
pub fn export_grid_csv(report: &GridReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "index",
        "param_hash",
        "adx_threshold",
        "rsi_oversold",
        "rsi_overbought",
        "atr_multiplier",
        "reward_ratio",
        "min_score",
        "trend_filter",
        "blocked_hours",
        "trades",
        "win_rate",
        "profit_factor",
        "net_pnl",
        "max_drawdown_pct",
        "qualified",
    ])?;

    for (rank, e) in report.ranked().into_iter().enumerate() {
        let p = &e.params;
        let hours = p
            .blocked_hours()
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        wtr.write_record([
            &(rank + 1).to_string(),
            &e.index.to_string(),
            e.param_hash.short(),
            &p.adx_threshold().to_string(),
            &p.rsi_oversold().to_string(),
            &p.rsi_overbought().to_string(),
            &p.atr_multiplier().to_string(),
            &p.reward_ratio().to_string(),
            &p.min_score().to_string(),
            &p.trend_filter().to_string(),
            &hours,
            &e.stats.total_trades.to_string(),
            &format!("{:.1}", e.stats.win_rate),
            &format!("{:.2}", e.stats.profit_factor),
            &format!("{:.2}", e.stats.net_pnl),
            &format!("{:.2}", e.stats.max_drawdown_pct),
            &e.qualified.to_string(),
        ])?;
    }

    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `result.json`, `trades.csv` and `equity.csv` into
/// `{output_dir}/{symbol}_{param hash}/` and return that directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("{}_{}", result.symbol, result.param_hash.short());
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity_curve)?)?;

    Ok(run_dir)
}
