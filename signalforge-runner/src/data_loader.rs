//! Bar loading for the runner.
//!
//! Two sources:
//! 1. CSV files with `timestamp,open,high,low,close[,volume]` rows
//! 2. Deterministic synthetic random walks (hourly, forex week only)
//!
//! Every series is validated before it is handed to the engine; a bad
//! bar fails the load instead of being repaired. Synthetic data is a
//! developer-only mode and is tagged on the result.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use signalforge_core::components::MarketHours;
use signalforge_core::domain::{Bar, BarError, DatasetHash};
use signalforge_core::fingerprint::dataset_hash;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("no bars in {0}")]
    Empty(String),

    #[error("invalid bar data: {0}")]
    Invalid(#[from] BarError),
}

/// Anything that can produce an ordered bar series.
pub trait BarSource {
    /// Label used in logs and results.
    fn name(&self) -> &str;

    fn is_synthetic(&self) -> bool {
        false
    }

    fn fetch(&self) -> Result<Vec<Bar>, LoadError>;
}

/// A validated series ready for the engine.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub source: String,
    pub bars: Vec<Bar>,
    pub dataset_hash: DatasetHash,
    pub has_synthetic: bool,
}

/// Fetch, validate and hash.
pub fn load_bars(source: &dyn BarSource) -> Result<LoadedData, LoadError> {
    let bars = source.fetch()?;
    if bars.is_empty() {
        return Err(LoadError::Empty(source.name().to_string()));
    }
    Bar::validate_series(&bars)?;
    let dataset_hash = dataset_hash(&bars);
    info!(
        source = source.name(),
        bars = bars.len(),
        hash = %dataset_hash,
        "loaded bars"
    );
    Ok(LoadedData {
        source: source.name().to_string(),
        bars,
        dataset_hash,
        has_synthetic: source.is_synthetic(),
    })
}

// ─── CSV ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS+00:00`, and naive
/// `YYYY-MM-DD HH:MM:SS` (read as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse bars from any CSV reader with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.unwrap_or(0.0),
        });
    }
    Ok(bars)
}

#[derive(Debug, Clone)]
pub struct CsvBars {
    path: PathBuf,
    name: String,
}

impl CsvBars {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BarSource for CsvBars {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<Bar>, LoadError> {
        let file = std::fs::File::open(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        read_csv(file)
    }
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Seeded hourly random walk. Same symbol, start and count → same bars.
#[derive(Debug, Clone)]
pub struct SyntheticBars {
    symbol: String,
    start: DateTime<Utc>,
    count: usize,
    start_price: f64,
    /// Per-bar return range, as a fraction of price.
    volatility: f64,
}

impl SyntheticBars {
    pub fn new(symbol: impl Into<String>, count: usize) -> Self {
        let symbol = symbol.into();
        let start_price = default_start_price(&symbol);
        Self {
            symbol,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 22, 0, 0).single().unwrap_or_default(),
            count,
            start_price,
            volatility: 0.002,
        }
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }
}

fn default_start_price(symbol: &str) -> f64 {
    let upper = symbol.to_ascii_uppercase();
    if upper.contains("EURUSD") {
        1.10
    } else if upper.contains("GC=F") || upper.contains("XAU") {
        2_000.0
    } else if upper.contains("BTC") {
        40_000.0
    } else {
        100.0
    }
}

impl BarSource for SyntheticBars {
    fn name(&self) -> &str {
        &self.symbol
    }

    fn is_synthetic(&self) -> bool {
        true
    }

    fn fetch(&self) -> Result<Vec<Bar>, LoadError> {
        Ok(generate_synthetic_bars(self))
    }
}

/// Hourly bars during forex trading hours, seeded from the symbol name.
pub fn generate_synthetic_bars(spec: &SyntheticBars) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(spec.symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);
    let vol = spec.volatility.abs().max(1e-6);

    let mut bars = Vec::with_capacity(spec.count);
    let mut price = spec.start_price;
    let mut current = spec.start;

    // Slow drift regime so trends persist long enough to be scored.
    let mut drift = 0.0_f64;
    while bars.len() < spec.count {
        if !MarketHours::ForexWeek.is_open(current) {
            current += Duration::hours(1);
            continue;
        }
        if bars.len() % 120 == 0 {
            drift = rng.gen_range(-0.3..0.3) * vol;
        }

        let ret: f64 = drift + rng.gen_range(-vol..vol);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..vol));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..vol));
        let volume = rng.gen_range(500.0..5_000.0_f64).round();

        bars.push(Bar {
            timestamp: current,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
        current += Duration::hours(1);
    }
    debug!(symbol = %spec.symbol, bars = bars.len(), "generated synthetic bars");
    bars
}
