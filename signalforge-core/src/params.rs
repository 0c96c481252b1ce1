//! Strategy parameters: the unit swept by the grid search and read by the
//! scoring engine and risk model.
//!
//! `ParameterSpec` is the raw, serializable form (TOML, grid axes).
//! `ParameterSet` is the validated form; the only way to get one is through
//! `TryFrom<ParameterSpec>`, so every set in circulation satisfies the
//! range invariants. Values are never clamped into range.

use crate::domain::ParamHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("rsi_oversold ({oversold}) must be below rsi_overbought ({overbought})")]
    InvertedRsiBounds { oversold: f64, overbought: f64 },

    #[error("blocked hour {0} is not a UTC hour (0-23)")]
    InvalidHour(u32),
}

/// Unvalidated parameter values. Every field has the grid-search-optimized
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterSpec {
    pub adx_threshold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub atr_multiplier: f64,
    pub reward_ratio: f64,
    pub min_score: f64,
    pub blocked_hours: Vec<u32>,
    pub trend_filter: bool,
    pub dominance_margin: f64,
}

impl Default for ParameterSpec {
    fn default() -> Self {
        Self {
            adx_threshold: 25.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            atr_multiplier: 2.0,
            reward_ratio: 2.5,
            min_score: 5.0,
            blocked_hours: Vec::new(),
            trend_filter: false,
            dominance_margin: 1.0,
        }
    }
}

/// Validated, immutable parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterSpec", into = "ParameterSpec")]
pub struct ParameterSet {
    adx_threshold: f64,
    rsi_oversold: f64,
    rsi_overbought: f64,
    atr_multiplier: f64,
    reward_ratio: f64,
    min_score: f64,
    blocked_hours: BTreeSet<u32>,
    trend_filter: bool,
    dominance_margin: f64,
}

pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64, ParamError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParamError::NonFinite { field, value })
    }
}

pub(crate) fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, ParamError> {
    let value = finite(field, value)?;
    if value < min || value > max {
        return Err(ParamError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ParamError> {
    let value = finite(field, value)?;
    if value <= 0.0 {
        return Err(ParamError::NotPositive { field, value });
    }
    Ok(value)
}

impl TryFrom<ParameterSpec> for ParameterSet {
    type Error = ParamError;

    fn try_from(spec: ParameterSpec) -> Result<Self, Self::Error> {
        let adx_threshold = in_range("adx_threshold", spec.adx_threshold, 0.0, 100.0)?;
        let rsi_oversold = in_range("rsi_oversold", spec.rsi_oversold, 0.0, 100.0)?;
        let rsi_overbought = in_range("rsi_overbought", spec.rsi_overbought, 0.0, 100.0)?;
        if rsi_oversold >= rsi_overbought {
            return Err(ParamError::InvertedRsiBounds {
                oversold: rsi_oversold,
                overbought: rsi_overbought,
            });
        }
        let atr_multiplier = positive("atr_multiplier", spec.atr_multiplier)?;
        let reward_ratio = positive("reward_ratio", spec.reward_ratio)?;
        let min_score = in_range("min_score", spec.min_score, 0.0, f64::MAX)?;
        let dominance_margin = in_range("dominance_margin", spec.dominance_margin, 0.0, f64::MAX)?;

        let mut blocked_hours = BTreeSet::new();
        for hour in spec.blocked_hours {
            if hour > 23 {
                return Err(ParamError::InvalidHour(hour));
            }
            blocked_hours.insert(hour);
        }

        Ok(Self {
            adx_threshold,
            rsi_oversold,
            rsi_overbought,
            atr_multiplier,
            reward_ratio,
            min_score,
            blocked_hours,
            trend_filter: spec.trend_filter,
            dominance_margin,
        })
    }
}

impl From<ParameterSet> for ParameterSpec {
    fn from(set: ParameterSet) -> Self {
        Self {
            adx_threshold: set.adx_threshold,
            rsi_oversold: set.rsi_oversold,
            rsi_overbought: set.rsi_overbought,
            atr_multiplier: set.atr_multiplier,
            reward_ratio: set.reward_ratio,
            min_score: set.min_score,
            blocked_hours: set.blocked_hours.into_iter().collect(),
            trend_filter: set.trend_filter,
            dominance_margin: set.dominance_margin,
        }
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        let d = ParameterSpec::default();
        Self {
            adx_threshold: d.adx_threshold,
            rsi_oversold: d.rsi_oversold,
            rsi_overbought: d.rsi_overbought,
            atr_multiplier: d.atr_multiplier,
            reward_ratio: d.reward_ratio,
            min_score: d.min_score,
            blocked_hours: BTreeSet::new(),
            trend_filter: d.trend_filter,
            dominance_margin: d.dominance_margin,
        }
    }
}

impl ParameterSet {
    pub fn adx_threshold(&self) -> f64 {
        self.adx_threshold
    }

    pub fn rsi_oversold(&self) -> f64 {
        self.rsi_oversold
    }

    pub fn rsi_overbought(&self) -> f64 {
        self.rsi_overbought
    }

    pub fn atr_multiplier(&self) -> f64 {
        self.atr_multiplier
    }

    pub fn reward_ratio(&self) -> f64 {
        self.reward_ratio
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn blocked_hours(&self) -> &BTreeSet<u32> {
        &self.blocked_hours
    }

    pub fn is_blocked_hour(&self, hour: u32) -> bool {
        self.blocked_hours.contains(&hour)
    }

    pub fn trend_filter(&self) -> bool {
        self.trend_filter
    }

    pub fn dominance_margin(&self) -> f64 {
        self.dominance_margin
    }

    pub fn to_spec(&self) -> ParameterSpec {
        self.clone().into()
    }

    /// Full hash of every parameter value, taken over [`Self::canonical_json`].
    pub fn fingerprint(&self) -> ParamHash {
        ParamHash::from_bytes(self.canonical_json().as_bytes())
    }

    /// Compact JSON with keys sorted alphabetically (serde_json's default
    /// map ordering) and blocked hours in ascending order.
    fn canonical_json(&self) -> String {
        serde_json::json!({
            "adx_threshold": self.adx_threshold,
            "rsi_oversold": self.rsi_oversold,
            "rsi_overbought": self.rsi_overbought,
            "atr_multiplier": self.atr_multiplier,
            "reward_ratio": self.reward_ratio,
            "min_score": self.min_score,
            "blocked_hours": self.blocked_hours,
            "trend_filter": self.trend_filter,
            "dominance_margin": self.dominance_margin,
        })
        .to_string()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ADX>{} RSI {}-{} ATRx{} RR {} score>={} trend:{}",
            self.adx_threshold,
            self.rsi_oversold,
            self.rsi_overbought,
            self.atr_multiplier,
            self.reward_ratio,
            self.min_score,
            if self.trend_filter { "on" } else { "off" },
        )?;
        if !self.blocked_hours.is_empty() {
            let hours: Vec<String> = self.blocked_hours.iter().map(|h| h.to_string()).collect();
            write!(f, " blocked:{}", hours.join(","))?;
        }
        Ok(())
    }
}
