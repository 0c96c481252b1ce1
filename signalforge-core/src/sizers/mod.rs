//! Risk model: turns an accepted direction, entry price and ATR into
//! stop, target, entry zone and position size.
//!
//! Sizing is fixed-risk: a stop-out loses exactly the configured budget,
//! independent of account equity.

pub mod atr_risk;

pub use atr_risk::{RiskModel, TradePlan, DEFAULT_ENTRY_BUFFER_PCT, DEFAULT_RISK_PER_TRADE};
