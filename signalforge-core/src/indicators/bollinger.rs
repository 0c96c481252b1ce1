//! Bollinger band position.
//!
//! middle = SMA(close, period), band = middle ± k * stddev (population).
//! position = (close - lower) / (upper - lower): 0 at the lower band,
//! 1 at the upper band. A zero-width band yields 0.5.
//! Lookback: period - 1.

use crate::components::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct BollingerPosition {
    period: usize,
    multiplier: f64,
    name: String,
}

impl BollingerPosition {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("bb_position_{period}_{multiplier}"),
        }
    }
}

impl Indicator for BollingerPosition {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut result = vec![None; n];
        if n < self.period {
            return result;
        }

        let p = self.period as f64;
        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            let mean = window.iter().map(|b| b.close).sum::<f64>() / p;
            let var = window.iter().map(|b| (b.close - mean).powi(2)).sum::<f64>() / p;
            let width = 2.0 * self.multiplier * var.sqrt();
            let lower = mean - self.multiplier * var.sqrt();
            result[i] = Some(if width > 0.0 {
                (bars[i].close - lower) / width
            } else {
                0.5
            });
        }
        result
    }
}
