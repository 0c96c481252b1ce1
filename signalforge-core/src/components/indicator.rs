//! Indicator trait and precomputed indicator values container.
//!
//! Indicators are pure functions: bar history in, series out. They are
//! computed once per bar sequence and then read by bar index during the
//! scoring pass. `None` marks the warm-up window and is never conflated
//! with a real `0.0` reading.

use crate::domain::Bar;
use std::collections::HashMap;

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Series name (e.g. "ema_20", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first bar that can carry a value.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole bar series. The output has the
    /// same length as `bars`; entries before `lookback()` are `None`.
    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>>;
}

/// Named indicator series aligned one-to-one with the bar index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<Option<f64>>>,
    len: usize,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named series. The first insert fixes the expected length;
    /// later series of a different length are truncated or padded with `None`.
    pub fn insert(&mut self, name: impl Into<String>, mut values: Vec<Option<f64>>) {
        if self.series.is_empty() {
            self.len = values.len();
        } else {
            values.resize(self.len, None);
        }
        self.series.insert(name.into(), values);
    }

    /// Value at `bar_index`, or `None` when the series is unknown, out of
    /// range, or still warming up.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied().flatten())
    }

    /// Value at `bar_index` and at the bar before it.
    pub fn pair(&self, name: &str, bar_index: usize) -> Option<(f64, f64)> {
        let prev = bar_index.checked_sub(1)?;
        Some((self.get(name, bar_index)?, self.get(name, prev)?))
    }

    pub fn get_series(&self, name: &str) -> Option<&[Option<f64>]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Number of bars each series covers.
    pub fn bar_count(&self) -> usize {
        self.len
    }

    /// Number of series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
