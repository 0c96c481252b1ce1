//! SignalForge CLI: backtest, grid search, live signal pass and trade
//! inspection.
//!
//! Commands:
//! - `backtest`: replay one parameter set over CSV or synthetic bars
//! - `grid-search`: rank every combination of the configured grid
//! - `signal`: one pipeline pass on the latest bar; persists trades
//! - `trades`: show persisted open trades and trailing-stop statistics

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use signalforge_core::engine::{JsonFileStore, TradeMonitor};
use signalforge_core::indicators::IndicatorSet;
use signalforge_core::pipeline::{Alert, AlertSink, Decision, PipelineError, SignalPipeline};
use signalforge_runner::reporting::{export_grid_csv, render_grid_summary, render_summary, save_artifacts};
use signalforge_runner::{
    load_bars, run_backtest, AppConfig, CsvBars, GridSearch, LoadedData, ParamGrid, SyntheticBars,
};

#[derive(Parser)]
#[command(
    name = "signalforge",
    about = "SignalForge: indicator scoring, trailing-stop trades and backtests"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where bars come from.
#[derive(Args)]
struct DataArgs {
    /// Instrument symbol, e.g. EURUSD=X.
    #[arg(long, default_value = "EURUSD=X")]
    symbol: String,

    /// CSV file with timestamp,open,high,low,close[,volume].
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Generate this many seeded synthetic hourly bars instead.
    #[arg(long)]
    synthetic: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest with the configured parameters.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Directory for result.json, trades.csv and equity.csv.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Evaluate every combination of the configured grid.
    GridSearch {
        #[command(flatten)]
        data: DataArgs,

        /// Number of ranked entries to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Minimum closed trades for an entry to rank as qualified.
        #[arg(long, default_value_t = 15)]
        min_trades: usize,

        /// Run combinations on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write the full ranking as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// One pipeline pass: track open trades, then score the latest bar.
    Signal {
        #[command(flatten)]
        data: DataArgs,

        /// Evaluation time (RFC 3339). Defaults to the current time.
        #[arg(long)]
        now: Option<String>,
    },
    /// Show persisted trades and trailing-stop statistics.
    Trades,
}

/// Prints alerts to stdout.
struct StdoutSink;

impl AlertSink for StdoutSink {
    fn send(&self, alert: &Alert) -> Result<(), PipelineError> {
        println!("{alert}");
        Ok(())
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Backtest { data, output_dir } => run_backtest_cmd(&config, &data, output_dir),
        Commands::GridSearch {
            data,
            top,
            min_trades,
            sequential,
            csv,
        } => run_grid_cmd(&config, &data, top, min_trades, sequential, csv),
        Commands::Signal { data, now } => run_signal_cmd(&config, &data, now),
        Commands::Trades => run_trades_cmd(&config),
    }
}

fn load(data: &DataArgs) -> Result<LoadedData> {
    let loaded = match (&data.data, data.synthetic) {
        (Some(path), _) => load_bars(&CsvBars::new(path))?,
        (None, Some(count)) => load_bars(&SyntheticBars::new(&data.symbol, count))?,
        (None, None) => bail!("one of --data or --synthetic is required"),
    };
    if loaded.has_synthetic {
        println!("NOTE: running on SYNTHETIC data");
    }
    Ok(loaded)
}

fn run_backtest_cmd(config: &AppConfig, data: &DataArgs, output_dir: Option<PathBuf>) -> Result<()> {
    let loaded = load(data)?;
    let backtest = config.backtest_config()?;
    let indicators = IndicatorSet::standard().compute(&loaded.bars);

    let result = run_backtest(
        &data.symbol,
        &loaded.bars,
        &indicators,
        &loaded.dataset_hash,
        &config.parameters,
        &backtest,
    )?;
    print!("{}", render_summary(&result));

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_grid_cmd(
    config: &AppConfig,
    data: &DataArgs,
    top: usize,
    min_trades: usize,
    sequential: bool,
    csv: Option<PathBuf>,
) -> Result<()> {
    let loaded = load(data)?;
    let grid = ParamGrid::new(&config.grid)?;
    let search = GridSearch::new(config.backtest_config()?)
        .with_parallelism(!sequential)
        .with_min_trades(min_trades);

    let report = search.run(&grid, &data.symbol, &loaded.bars)?;
    print!("{}", render_grid_summary(&report, top));

    match report.profitable().first() {
        Some(best) => println!("\nBest profitable parameters:\n  {}", best.params),
        None => println!("\nNo combination was profitable with profit factor > 1.1"),
    }

    if let Some(path) = csv {
        std::fs::write(&path, export_grid_csv(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Ranking saved to: {}", path.display());
    }
    Ok(())
}

fn run_signal_cmd(config: &AppConfig, data: &DataArgs, now: Option<String>) -> Result<()> {
    let now: DateTime<Utc> = match now {
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .with_context(|| format!("invalid --now '{s}'"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let loaded = load(data)?;
    let Some(last_index) = loaded.bars.len().checked_sub(1) else {
        bail!("no bars loaded");
    };
    let indicators = IndicatorSet::standard().compute(&loaded.bars);

    let backtest = config.backtest_config()?;
    let store = JsonFileStore::new(&config.pipeline.trade_state_path);
    let monitor = TradeMonitor::load(store, backtest.trailing, backtest.intrabar_policy)?;
    let mut pipeline = SignalPipeline::new(
        config.pipeline_config(),
        config.parameters.clone(),
        backtest.risk_model(&config.parameters)?,
        monitor,
        Box::new(StdoutSink),
    )
    .with_instruments(config.instruments.clone());

    let events = pipeline.track(&data.symbol, &loaded.bars[last_index], last_index);
    info!(symbol = %data.symbol, events = events.len(), "tracked open trades");

    let decision = pipeline.process(&data.symbol, &loaded.bars, &indicators, now);
    match &decision {
        Decision::Accepted { signal, .. } => {
            println!("{}", serde_json::to_string_pretty(signal)?);
        }
        Decision::Refused { error, .. } => bail!("signal refused by trade monitor: {error}"),
        other => info!(symbol = %data.symbol, decision = ?other, "no trade"),
    }
    Ok(())
}

fn run_trades_cmd(config: &AppConfig) -> Result<()> {
    let backtest = config.backtest_config()?;
    let store = JsonFileStore::new(&config.pipeline.trade_state_path);
    let monitor = TradeMonitor::load(store, backtest.trailing, backtest.intrabar_policy)?;

    let mut any = false;
    for trade in monitor.open_trades() {
        any = true;
        println!(
            "{}  {} {}  entry {:.5}  stop {:.5}  target {:.5}  phase {:?}",
            trade.id,
            trade.direction,
            trade.symbol,
            trade.entry_price,
            trade.current_stop,
            trade.take_profit,
            trade.phase
        );
    }
    if !any {
        println!("No open trades.");
    }
    println!("\n{}", monitor.stats());
    Ok(())
}
