//! Grid search over `ParameterSet` combinations.
//!
//! Indicators and the dataset hash are computed once; every combination
//! then replays the same bars independently, in parallel by default.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use signalforge_core::domain::{Bar, DatasetHash, ParamHash};
use signalforge_core::fingerprint::dataset_hash;
use signalforge_core::indicators::IndicatorSet;
use signalforge_core::params::{ParamError, ParameterSet, ParameterSpec};

use crate::config::BacktestConfig;
use crate::metrics::TradeStats;
use crate::runner::{run_backtest, RunError};

/// Profit factor an entry must beat to count as profitable.
pub const MIN_PROFITABLE_PF: f64 = 1.1;

/// Default trade count below which an entry is ranked after all others.
pub const DEFAULT_MIN_TRADES: usize = 15;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid axis '{0}' has no values")]
    Empty(&'static str),

    #[error("grid combination {index} is invalid: {source}")]
    Invalid { index: usize, source: ParamError },

    #[error(transparent)]
    Run(#[from] RunError),
}

/// Candidate values per parameter. Deserializable from a `[grid]` TOML table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridSpec {
    pub adx_threshold: Vec<f64>,
    pub rsi_oversold: Vec<f64>,
    pub rsi_overbought: Vec<f64>,
    pub atr_multiplier: Vec<f64>,
    pub reward_ratio: Vec<f64>,
    pub min_score: Vec<f64>,
    pub trend_filter: Vec<bool>,
    pub blocked_hours: Vec<Vec<u32>>,
    /// Held fixed across the grid.
    pub dominance_margin: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::quick()
    }
}

impl GridSpec {
    /// The 648-combination quick sweep.
    pub fn quick() -> Self {
        Self {
            adx_threshold: vec![20.0, 25.0, 30.0],
            rsi_oversold: vec![30.0, 35.0],
            rsi_overbought: vec![65.0, 70.0],
            atr_multiplier: vec![1.5, 2.0, 2.5],
            reward_ratio: vec![2.0, 2.5, 3.0],
            min_score: vec![4.0, 4.5, 5.0],
            trend_filter: vec![true, false],
            blocked_hours: vec![Vec::new()],
            dominance_margin: ParameterSpec::default().dominance_margin,
        }
    }

    /// Exact cross-product cardinality.
    pub fn size(&self) -> usize {
        self.adx_threshold.len()
            * self.rsi_oversold.len()
            * self.rsi_overbought.len()
            * self.atr_multiplier.len()
            * self.reward_ratio.len()
            * self.min_score.len()
            * self.trend_filter.len()
            * self.blocked_hours.len()
    }

    fn check_axes(&self) -> Result<(), GridError> {
        let axes = [
            ("adx_threshold", self.adx_threshold.is_empty()),
            ("rsi_oversold", self.rsi_oversold.is_empty()),
            ("rsi_overbought", self.rsi_overbought.is_empty()),
            ("atr_multiplier", self.atr_multiplier.is_empty()),
            ("reward_ratio", self.reward_ratio.is_empty()),
            ("min_score", self.min_score.is_empty()),
            ("trend_filter", self.trend_filter.is_empty()),
            ("blocked_hours", self.blocked_hours.is_empty()),
        ];
        match axes.iter().find(|(_, empty)| *empty) {
            Some((name, _)) => Err(GridError::Empty(*name)),
            None => Ok(()),
        }
    }

    fn expand(&self) -> Vec<ParameterSpec> {
        let mut specs = Vec::with_capacity(self.size());
        for &adx_threshold in &self.adx_threshold {
            for &rsi_oversold in &self.rsi_oversold {
                for &rsi_overbought in &self.rsi_overbought {
                    for &atr_multiplier in &self.atr_multiplier {
                        for &reward_ratio in &self.reward_ratio {
                            for &min_score in &self.min_score {
                                for &trend_filter in &self.trend_filter {
                                    for blocked_hours in &self.blocked_hours {
                                        specs.push(ParameterSpec {
                                            adx_threshold,
                                            rsi_oversold,
                                            rsi_overbought,
                                            atr_multiplier,
                                            reward_ratio,
                                            min_score,
                                            blocked_hours: blocked_hours.clone(),
                                            trend_filter,
                                            dominance_margin: self.dominance_margin,
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        specs
    }
}

/// A validated grid: every combination is a usable `ParameterSet`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    combinations: Vec<ParameterSet>,
}

impl ParamGrid {
    pub fn new(spec: &GridSpec) -> Result<Self, GridError> {
        spec.check_axes()?;
        let combinations = spec
            .expand()
            .into_iter()
            .enumerate()
            .map(|(index, s)| {
                ParameterSet::try_from(s).map_err(|source| GridError::Invalid { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { combinations })
    }

    pub fn quick() -> Result<Self, GridError> {
        Self::new(&GridSpec::quick())
    }

    pub fn size(&self) -> usize {
        self.combinations.len()
    }

    pub fn combinations(&self) -> &[ParameterSet] {
        &self.combinations
    }
}

/// One evaluated combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEntry {
    /// Position in the grid's combination order.
    pub index: usize,
    pub params: ParameterSet,
    pub param_hash: ParamHash,
    pub stats: TradeStats,
    pub final_balance: f64,
    /// At least `min_trades` closed trades.
    pub qualified: bool,
}

impl GridEntry {
    pub fn is_profitable(&self) -> bool {
        self.qualified && self.stats.net_pnl > 0.0 && self.stats.profit_factor > MIN_PROFITABLE_PF
    }
}

/// Ranking order: qualified first, then PF desc, drawdown asc, net desc,
/// index asc.
pub fn rank_order(a: &GridEntry, b: &GridEntry) -> Ordering {
    b.qualified
        .cmp(&a.qualified)
        .then_with(|| b.stats.profit_factor.total_cmp(&a.stats.profit_factor))
        .then_with(|| a.stats.max_drawdown_pct.total_cmp(&b.stats.max_drawdown_pct))
        .then_with(|| b.stats.net_pnl.total_cmp(&a.stats.net_pnl))
        .then_with(|| a.index.cmp(&b.index))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridReport {
    pub symbol: String,
    pub dataset_hash: DatasetHash,
    pub min_trades: usize,
    /// Entries in combination order.
    pub entries: Vec<GridEntry>,
}

impl GridReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ranked(&self) -> Vec<&GridEntry> {
        let mut ranked: Vec<&GridEntry> = self.entries.iter().collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked
    }

    /// Profitable entries, in ranking order.
    pub fn profitable(&self) -> Vec<&GridEntry> {
        self.ranked()
            .into_iter()
            .filter(|e| e.is_profitable())
            .collect()
    }

    pub fn best(&self) -> Option<&GridEntry> {
        self.ranked().into_iter().next()
    }

    pub fn top(&self, n: usize) -> Vec<&GridEntry> {
        self.ranked().into_iter().take(n).collect()
    }
}

/// Grid search executor.
#[derive(Debug, Clone)]
pub struct GridSearch {
    config: BacktestConfig,
    parallel: bool,
    min_trades: usize,
}

impl GridSearch {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            parallel: true,
            min_trades: DEFAULT_MIN_TRADES,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_min_trades(mut self, min_trades: usize) -> Self {
        self.min_trades = min_trades;
        self
    }

    /// Run every combination of `grid` over `bars`.
    pub fn run(&self, grid: &ParamGrid, symbol: &str, bars: &[Bar]) -> Result<GridReport, GridError> {
        Bar::validate_series(bars).map_err(RunError::from)?;
        let indicators = IndicatorSet::standard().compute(bars);
        let hash = dataset_hash(bars);

        info!(
            symbol,
            combinations = grid.size(),
            bars = bars.len(),
            parallel = self.parallel,
            "grid search started"
        );

        let evaluate = |(index, params): (usize, &ParameterSet)| -> Result<GridEntry, GridError> {
            let result = run_backtest(symbol, bars, &indicators, &hash, params, &self.config)?;
            Ok(GridEntry {
                index,
                params: params.clone(),
                param_hash: result.param_hash,
                qualified: result.stats.total_trades >= self.min_trades,
                stats: result.stats,
                final_balance: result.final_balance,
            })
        };

        let entries = if self.parallel {
            grid.combinations()
                .par_iter()
                .enumerate()
                .map(evaluate)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            grid.combinations()
                .iter()
                .enumerate()
                .map(evaluate)
                .collect::<Result<Vec<_>, _>>()?
        };

        let report = GridReport {
            symbol: symbol.to_string(),
            dataset_hash: hash,
            min_trades: self.min_trades,
            entries,
        };
        info!(
            symbol,
            qualified = report.entries.iter().filter(|e| e.qualified).count(),
            profitable = report.profitable().len(),
            "grid search finished"
        );
        Ok(report)
    }
}
