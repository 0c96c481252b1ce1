//! ATR risk model.
//!
//! # Formula
//! ```text
//! risk_distance = atr_multiplier * ATR
//! stop          = entry ∓ risk_distance
//! target        = entry ± reward_ratio * risk_distance
//! size          = risk_per_trade / risk_distance
//! entry zone    = entry ± entry * entry_buffer_pct
//! ```
//!
//! # Example
//! - Entry 1.1000, ATR 0.0025, multiplier 2.0 → distance 0.0050, stop 1.0950
//! - Reward ratio 2.5 → target 1.1125
//! - $50 risk / 0.0050 = 10,000 units (0.10 lots of EUR/USD)

use crate::domain::Direction;
use crate::params::{finite, positive, ParamError, ParameterSet};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RISK_PER_TRADE: f64 = 50.0;
pub const DEFAULT_ENTRY_BUFFER_PCT: f64 = 0.0003;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub risk_distance: f64,
    pub size: f64,
    pub entry_min: f64,
    pub entry_max: f64,
}

impl TradePlan {
    /// Money at risk if the initial stop is hit.
    pub fn risk_amount(&self) -> f64 {
        self.risk_distance * self.size
    }

    /// Money gained if the target is hit.
    pub fn reward_amount(&self) -> f64 {
        (self.target - self.entry).abs() * self.size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskModel {
    risk_per_trade: f64,
    atr_multiplier: f64,
    reward_ratio: f64,
    entry_buffer_pct: f64,
}

impl RiskModel {
    pub fn new(
        risk_per_trade: f64,
        entry_buffer_pct: f64,
        params: &ParameterSet,
    ) -> Result<Self, ParamError> {
        let risk_per_trade = positive("risk_per_trade", risk_per_trade)?;
        let entry_buffer_pct = finite("entry_buffer_pct", entry_buffer_pct)?;
        if entry_buffer_pct < 0.0 {
            return Err(ParamError::OutOfRange {
                field: "entry_buffer_pct",
                value: entry_buffer_pct,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self {
            risk_per_trade,
            atr_multiplier: params.atr_multiplier(),
            reward_ratio: params.reward_ratio(),
            entry_buffer_pct,
        })
    }

    pub fn risk_per_trade(&self) -> f64 {
        self.risk_per_trade
    }

    /// Plan a trade. Returns `None` when the ATR gives no usable stop
    /// distance (zero, negative or non-finite).
    pub fn plan(&self, direction: Direction, entry: f64, atr: f64) -> Option<TradePlan> {
        let risk_distance = self.atr_multiplier * atr;
        if !risk_distance.is_finite() || risk_distance <= 0.0 || !entry.is_finite() {
            return None;
        }
        let sign = direction.sign();
        let buffer = entry * self.entry_buffer_pct;
        Some(TradePlan {
            direction,
            entry,
            stop: entry - sign * risk_distance,
            target: entry + sign * self.reward_ratio * risk_distance,
            risk_distance,
            size: self.risk_per_trade / risk_distance,
            entry_min: entry - buffer,
            entry_max: entry + buffer,
        })
    }
}

impl Default for RiskModel {
    fn default() -> Self {
        let params = ParameterSet::default();
        Self {
            risk_per_trade: DEFAULT_RISK_PER_TRADE,
            atr_multiplier: params.atr_multiplier(),
            reward_ratio: params.reward_ratio(),
            entry_buffer_pct: DEFAULT_ENTRY_BUFFER_PCT,
        }
    }
}
