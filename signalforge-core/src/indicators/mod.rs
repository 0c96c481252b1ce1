//! Concrete indicator implementations.
//!
//! Every indicator implements `components::indicator::Indicator`. Multi-line
//! indicators (Stochastic %K/%D) are exposed as separate named instances,
//! keeping the single-series trait unchanged. `IndicatorSet` bundles the
//! set the scoring engine reads.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod stochastic;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::BollingerPosition;
pub use ema::Ema;
pub use macd::MacdHistogram;
pub use rsi::Rsi;
pub use stochastic::{Stochastic, StochasticLine};

use crate::components::indicator::{Indicator, IndicatorValues};
use crate::domain::Bar;

/// Series names of the standard set, as read by the scoring engine.
pub mod names {
    pub const EMA_FAST: &str = "ema_20";
    pub const EMA_MID: &str = "ema_50";
    pub const EMA_SLOW: &str = "ema_200";
    pub const RSI: &str = "rsi_14";
    pub const ATR: &str = "atr_14";
    pub const ADX: &str = "adx_14";
    pub const MACD_HIST: &str = "macd_hist_12_26_9";
    pub const BB_POSITION: &str = "bb_position_20_2";
    pub const STOCH_K: &str = "stoch_k_14_3_3";
    pub const STOCH_D: &str = "stoch_d_14_3_3";

    /// Every series the scoring engine needs at the current and previous bar.
    pub const REQUIRED: [&str; 10] = [
        EMA_FAST,
        EMA_MID,
        EMA_SLOW,
        RSI,
        ATR,
        ADX,
        MACD_HIST,
        BB_POSITION,
        STOCH_K,
        STOCH_D,
    ];
}

/// An ordered collection of indicators computed together over one bar series.
pub struct IndicatorSet {
    indicators: Vec<Box<dyn Indicator>>,
}

impl IndicatorSet {
    pub fn new(indicators: Vec<Box<dyn Indicator>>) -> Self {
        Self { indicators }
    }

    /// EMA 20/50/200, RSI 14, ATR 14, ADX 14, MACD 12/26/9 histogram,
    /// Bollinger 20/2 position, Stochastic 14/3/3 %K and %D.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(Ema::new(20)),
            Box::new(Ema::new(50)),
            Box::new(Ema::new(200)),
            Box::new(Rsi::new(14)),
            Box::new(Atr::new(14)),
            Box::new(Adx::new(14)),
            Box::new(MacdHistogram::new(12, 26, 9)),
            Box::new(BollingerPosition::new(20, 2.0)),
            Box::new(Stochastic::k(14, 3, 3)),
            Box::new(Stochastic::d(14, 3, 3)),
        ])
    }

    /// Compute every series over `bars`.
    pub fn compute(&self, bars: &[Bar]) -> IndicatorValues {
        let mut values = IndicatorValues::new();
        for indicator in &self.indicators {
            let series = indicator.compute(bars);
            debug_assert_eq!(
                series.len(),
                bars.len(),
                "indicator '{}' produced {} values for {} bars",
                indicator.name(),
                series.len(),
                bars.len()
            );
            values.insert(indicator.name(), series);
        }
        values
    }

    /// First bar index at which every indicator in the set is defined.
    pub fn warmup(&self) -> usize {
        self.indicators
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0)
    }

    pub fn names(&self) -> Vec<&str> {
        self.indicators.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

impl std::fmt::Debug for IndicatorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorSet")
            .field("indicators", &self.names())
            .finish()
    }
}

/// Create hourly synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Unwrap a defined indicator value in tests.
#[cfg(test)]
pub fn defined(value: Option<f64>) -> f64 {
    value.expect("indicator value should be defined")
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
