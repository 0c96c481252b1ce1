//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1]
//! Seed: EMA[period-1] = SMA of first `period` close values.
//! Lookback: period - 1.

use crate::components::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        ema_of_series(&closes(bars), self.period)
    }
}

pub(crate) fn closes(bars: &[Bar]) -> Vec<Option<f64>> {
    bars.iter().map(|b| Some(b.close)).collect()
}

/// EMA of an arbitrary series, alpha = 2/(period+1).
/// Used by composed indicators (MACD signal line).
pub fn ema_of_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    seeded_smooth(values, period, 2.0 / (period as f64 + 1.0))
}

/// Simple moving average over windows where every input is defined.
pub fn sma_of_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        let sum: Option<f64> = window.iter().copied().sum();
        result[i] = sum.map(|s| s / period as f64);
    }
    result
}

/// Exponential smoothing seeded with the mean of the first `period`
/// consecutive defined values. A gap after the seed ends the series.
pub(crate) fn seeded_smooth(values: &[Option<f64>], period: usize, alpha: f64) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }

    let Some(seed_start) = (0..=n - period)
        .find(|&s| values[s..s + period].iter().all(|v| v.is_some()))
    else {
        return result;
    };
    let seed_end = seed_start + period;

    let seed: f64 = values[seed_start..seed_end].iter().flatten().sum::<f64>() / period as f64;
    result[seed_end - 1] = Some(seed);

    let mut prev = seed;
    for i in seed_end..n {
        let Some(v) = values[i] else {
            return result;
        };
        let next = alpha * v + (1.0 - alpha) * prev;
        result[i] = Some(next);
        prev = next;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, defined, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_close() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Ema::new(1).compute(&bars);
        assert_approx(defined(result[0]), 100.0, DEFAULT_EPSILON);
        assert_approx(defined(result[1]), 200.0, DEFAULT_EPSILON);
        assert_approx(defined(result[2]), 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5; seed at index 2 = mean(10,11,12) = 11
        // EMA[3] = 0.5*13 + 0.5*11 = 12; EMA[4] = 0.5*14 + 0.5*12 = 13
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Ema::new(3).compute(&bars);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_approx(defined(result[2]), 11.0, DEFAULT_EPSILON);
        assert_approx(defined(result[3]), 12.0, DEFAULT_EPSILON);
        assert_approx(defined(result[4]), 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_short_history_is_undefined() {
        let bars = make_bars(&[10.0, 11.0]);
        let result = Ema::new(3).compute(&bars);
        assert_eq!(result, vec![None, None]);
    }

    #[test]
    fn ema_lookback() {
        assert_eq!(Ema::new(200).lookback(), 199);
        assert_eq!(Ema::new(1).lookback(), 0);
    }

    #[test]
    fn ema_of_series_skips_leading_gap() {
        let values = vec![None, None, Some(2.0), Some(4.0), Some(6.0)];
        let result = ema_of_series(&values, 2);
        assert_eq!(result[2], None);
        // seed = mean(2,4) = 3 at index 3; alpha = 2/3 → 2/3*6 + 1/3*3 = 5
        assert_approx(defined(result[3]), 3.0, DEFAULT_EPSILON);
        assert_approx(defined(result[4]), 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_known_values() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)];
        let result = sma_of_series(&values, 2);
        assert_eq!(result[0], None);
        assert_approx(defined(result[1]), 1.5, DEFAULT_EPSILON);
        assert_approx(defined(result[2]), 2.5, DEFAULT_EPSILON);
        assert_eq!(result[3], None);
        assert_eq!(result[4], None);
    }
}
