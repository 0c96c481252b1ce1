//! Backtest runner: replays bars through the scoring engine and the
//! trailing-stop state machine.
//!
//! Two entry points:
//! - `run_backtest()`: takes bars plus precomputed indicators. Used by the
//!   grid search so indicators are computed once per dataset.
//! - `run_on_bars()`: validates, computes indicators and hashes, then runs.
//!
//! The loop state is an explicit `BacktestState` value threaded through
//! `step()`; nothing outside it changes between bars.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use signalforge_core::components::{IndicatorValues, ScoringEngine};
use signalforge_core::domain::{Bar, BarError, DatasetHash, ParamHash, Trade, TradeId};
use signalforge_core::fingerprint::dataset_hash;
use signalforge_core::indicators::IndicatorSet;
use signalforge_core::params::{ParamError, ParameterSet};
use signalforge_core::position_management::{advance_trade, IntrabarPolicy, TrailingRule};

use crate::config::BacktestConfig;
use crate::metrics::TradeStats;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid bar data: {0}")]
    Data(#[from] BarError),

    #[error("invalid settings: {0}")]
    Params(#[from] ParamError),
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub params: ParameterSet,
    pub param_hash: ParamHash,
    pub dataset_hash: DatasetHash,
    pub bar_count: usize,
    pub signal_count: usize,
    pub initial_capital: f64,
    pub final_balance: f64,
    pub stats: TradeStats,
    /// Balance after each bar.
    pub equity_curve: Vec<f64>,
    /// Closed trades in exit order.
    pub trades: Vec<Trade>,
    /// Position still open when the data ran out; excluded from `stats`.
    pub open_trade: Option<Trade>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Read-only inputs of one run.
pub struct BacktestContext<'a> {
    pub symbol: &'a str,
    pub bars: &'a [Bar],
    pub indicators: &'a IndicatorValues,
    pub engine: ScoringEngine,
    pub rule: TrailingRule,
    pub policy: IntrabarPolicy,
}

/// Mutable loop state, passed into and returned from [`step`].
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestState {
    pub open: Option<Trade>,
    pub closed: Vec<Trade>,
    pub balance: f64,
    /// Balance after each bar; drawdown is derived from it.
    pub equity_curve: Vec<f64>,
    pub signal_count: usize,
}

impl BacktestState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            open: None,
            closed: Vec::new(),
            balance: initial_capital,
            equity_curve: Vec::new(),
            signal_count: 0,
        }
    }
}

/// Advance the state through bar `index`.
///
/// 1. Advance the open trade; a close books its P&L into the balance.
/// 2. Record the balance on the equity curve.
/// 3. If flat, score the bar and open a trade at its close.
///
/// A trade opened on bar `i` is first managed on bar `i + 1`.
pub fn step(mut state: BacktestState, ctx: &BacktestContext<'_>, index: usize) -> BacktestState {
    let Some(bar) = ctx.bars.get(index) else {
        return state;
    };

    if let Some(trade) = state.open.take() {
        let update = advance_trade(&trade, bar, index, &ctx.rule, ctx.policy);
        if update.closed() {
            state.balance += update.trade.realized_pnl;
            state.closed.push(update.trade);
        } else {
            state.open = Some(update.trade);
        }
    }

    state.equity_curve.push(state.balance);

    if state.open.is_none() {
        if let Some(signal) = ctx.engine.evaluate(ctx.bars, index, ctx.indicators) {
            state.signal_count += 1;
            let id = TradeId::for_backtest(ctx.symbol, index);
            state.open = Some(Trade::open(id, &signal));
        }
    }

    state
}

/// Run one parameter set over pre-validated bars and precomputed indicators.
pub fn run_backtest(
    symbol: &str,
    bars: &[Bar],
    indicators: &IndicatorValues,
    dataset_hash: &DatasetHash,
    params: &ParameterSet,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    let risk = config.risk_model(params)?;
    let ctx = BacktestContext {
        symbol,
        bars,
        indicators,
        engine: ScoringEngine::new(symbol, params.clone(), risk),
        rule: config.trailing,
        policy: config.intrabar_policy,
    };

    let state = (0..bars.len()).fold(BacktestState::new(config.initial_capital), |state, i| {
        step(state, &ctx, i)
    });

    let stats = TradeStats::compute(&state.closed, &state.equity_curve);
    debug!(
        symbol,
        params = %params,
        trades = stats.total_trades,
        net = stats.net_pnl,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        symbol: symbol.to_string(),
        params: params.clone(),
        param_hash: params.fingerprint(),
        dataset_hash: dataset_hash.clone(),
        bar_count: bars.len(),
        signal_count: state.signal_count,
        initial_capital: config.initial_capital,
        final_balance: state.balance,
        stats,
        equity_curve: state.equity_curve,
        trades: state.closed,
        open_trade: state.open,
    })
}

/// Validate, compute the standard indicators, hash, and run.
pub fn run_on_bars(
    symbol: &str,
    bars: &[Bar],
    params: &ParameterSet,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    Bar::validate_series(bars)?;
    let indicators = IndicatorSet::standard().compute(bars);
    run_backtest(symbol, bars, &indicators, &dataset_hash(bars), params, config)
}
