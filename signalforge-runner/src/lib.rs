//! SignalForge runner: everything around the core engine that touches
//! files or spans many runs.
//!
//! - TOML configuration
//! - Bar loading (CSV, deterministic synthetic walk)
//! - Single-backtest replay and trade statistics
//! - Grid search over parameter combinations
//! - Text summaries with star rating, JSON/CSV export

pub mod config;
pub mod data_loader;
pub mod metrics;
pub mod reporting;
pub mod runner;
pub mod sweep;

pub use config::{AppConfig, BacktestConfig, ConfigError};
pub use data_loader::{
    generate_synthetic_bars, load_bars, read_csv, BarSource, CsvBars, LoadError, LoadedData,
    SyntheticBars,
};
pub use metrics::TradeStats;
pub use reporting::{render_grid_summary, render_summary, Rating};
pub use runner::{run_backtest, run_on_bars, step, BacktestResult, BacktestState, RunError};
pub use sweep::{GridEntry, GridError, GridReport, GridSearch, GridSpec, ParamGrid};
