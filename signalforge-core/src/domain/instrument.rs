//! Tradable instruments and lot conversion.
//!
//! Position size is computed in price units (risk budget / stop distance).
//! Brokers quote size in lots, so each instrument carries the number of
//! units in one standard lot.

use serde::{Deserialize, Serialize};

/// Smallest lot increment accepted by the broker.
pub const LOT_STEP: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    /// Human-readable name used in alerts (e.g. "EUR/USD").
    pub name: String,
    /// Units per standard lot.
    pub contract_size: f64,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, contract_size: f64) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            contract_size,
        }
    }

    /// EUR/USD: 1 lot = 100,000 units, $10 per pip.
    pub fn eurusd() -> Self {
        Self::new("EURUSD=X", "EUR/USD", 100_000.0)
    }

    /// Gold: 1 lot = 100 oz.
    pub fn gold() -> Self {
        Self::new("GC=F", "Gold", 100.0)
    }

    /// Bitcoin: 1 lot = 1 BTC.
    pub fn bitcoin() -> Self {
        Self::new("BTC-USD", "Bitcoin", 1.0)
    }

    pub fn defaults() -> Vec<Instrument> {
        vec![Self::eurusd(), Self::gold(), Self::bitcoin()]
    }

    /// Look up a built-in instrument, matching common aliases
    /// (`XAUUSD` for gold, `EURUSD` without the Yahoo suffix).
    pub fn lookup(symbol: &str) -> Option<Instrument> {
        let upper = symbol.to_ascii_uppercase();
        if upper.contains("EURUSD") {
            Some(Self::eurusd())
        } else if upper.contains("GC=F") || upper.contains("XAU") {
            Some(Self::gold())
        } else if upper.contains("BTC") {
            Some(Self::bitcoin())
        } else {
            None
        }
    }

    /// Convert a unit size into lots, rounded to [`LOT_STEP`] with a
    /// one-step floor so a valid signal never maps to a zero order.
    pub fn lots(&self, units: f64) -> f64 {
        if !units.is_finite() || units <= 0.0 || self.contract_size <= 0.0 {
            return LOT_STEP;
        }
        let lots = (units / self.contract_size / LOT_STEP).round() * LOT_STEP;
        lots.max(LOT_STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eurusd_lot_size_for_fifty_pip_stop() {
        // $50 risk over a 50-pip stop = 10,000 units = 0.10 lots
        let units = 50.0 / 0.0050;
        let lots = Instrument::eurusd().lots(units);
        assert!((lots - 0.10).abs() < 1e-9);
    }

    #[test]
    fn gold_lot_size() {
        // $100 risk over a $5 stop = 20 oz = 0.20 lots
        let lots = Instrument::gold().lots(100.0 / 5.0);
        assert!((lots - 0.20).abs() < 1e-9);
    }

    #[test]
    fn tiny_size_floors_at_one_step() {
        assert_eq!(Instrument::bitcoin().lots(0.0001), LOT_STEP);
        assert_eq!(Instrument::bitcoin().lots(f64::NAN), LOT_STEP);
    }

    #[test]
    fn lookup_accepts_aliases() {
        assert_eq!(Instrument::lookup("XAUUSD").map(|i| i.name), Some("Gold".into()));
        assert_eq!(Instrument::lookup("eurusd").map(|i| i.contract_size), Some(100_000.0));
        assert!(Instrument::lookup("SPY").is_none());
    }
}
