//! Signal components.
//!
//! - Indicator trait and precomputed values
//! - Scoring engine: weighted buy/sell scores and the accept decision
//! - Market filters: session blocklist and weekend closure

pub mod filter;
pub mod indicator;
pub mod scoring;

pub use filter::{MarketHours, MarketStatus};
pub use indicator::{Indicator, IndicatorValues};
pub use scoring::{ScoreCard, ScoringEngine, Skip, Trend};
