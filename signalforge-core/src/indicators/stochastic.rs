//! Stochastic oscillator (slow form).
//!
//! raw %K = 100 * (close - lowest_low(k)) / (highest_high(k) - lowest_low(k))
//! %K = SMA(smooth) of raw %K; %D = SMA(d) of %K.
//! A flat window gives raw %K = 50.
//! Exposed as two named instances, one per line.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::ema::sma_of_series;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochasticLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    smooth: usize,
    d_period: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    fn new(k_period: usize, smooth: usize, d_period: usize, line: StochasticLine) -> Self {
        assert!(
            k_period >= 1 && smooth >= 1 && d_period >= 1,
            "Stochastic periods must be >= 1"
        );
        let prefix = match line {
            StochasticLine::K => "stoch_k",
            StochasticLine::D => "stoch_d",
        };
        Self {
            k_period,
            smooth,
            d_period,
            line,
            name: format!("{prefix}_{k_period}_{smooth}_{d_period}"),
        }
    }

    pub fn k(k_period: usize, smooth: usize, d_period: usize) -> Self {
        Self::new(k_period, smooth, d_period, StochasticLine::K)
    }

    pub fn d(k_period: usize, smooth: usize, d_period: usize) -> Self {
        Self::new(k_period, smooth, d_period, StochasticLine::D)
    }

    fn raw_k(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut raw = vec![None; n];
        if n < self.k_period {
            return raw;
        }
        for i in (self.k_period - 1)..n {
            let window = &bars[i + 1 - self.k_period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = hh - ll;
            raw[i] = Some(if range > 0.0 {
                100.0 * (bars[i].close - ll) / range
            } else {
                50.0
            });
        }
        raw
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let k = self.k_period + self.smooth - 2;
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => k + self.d_period - 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let k = sma_of_series(&self.raw_k(bars), self.smooth);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => sma_of_series(&k, self.d_period),
        }
    }
}
