//! Bar: the fundamental market data unit.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// OHLCV bar for a single instrument at a fixed cadence (hourly by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Price column named in a data-integrity error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        };
        f.write_str(name)
    }
}

/// Data-integrity failures. The core never repairs a malformed series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index}: {field} price is not finite")]
    NonFinite { index: usize, field: PriceField },

    #[error("bar {index}: high {high} is below low {low}")]
    Inverted { index: usize, high: f64, low: f64 },

    #[error("bar {index}: timestamp {current} does not follow {previous}")]
    NonMonotonic {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    /// Hour of day (0-23) in UTC, used by the session filter.
    pub fn utc_hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check a single bar; `index` is only used for error reporting.
    pub fn check(&self, index: usize) -> Result<(), BarError> {
        for (field, value) in [
            (PriceField::Open, self.open),
            (PriceField::High, self.high),
            (PriceField::Low, self.low),
            (PriceField::Close, self.close),
        ] {
            if !value.is_finite() {
                return Err(BarError::NonFinite { index, field });
            }
        }
        if self.high < self.low {
            return Err(BarError::Inverted {
                index,
                high: self.high,
                low: self.low,
            });
        }
        Ok(())
    }

    /// Validate an ordered series: finite prices, high >= low, strictly
    /// increasing timestamps. Fails on the first offending bar.
    pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
        for (i, bar) in bars.iter().enumerate() {
            bar.check(i)?;
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(BarError::NonMonotonic {
                    index: i,
                    previous: bars[i - 1].timestamp,
                    current: bar.timestamp,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_bar(hour: u32) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap(),
            1.1000,
            1.1020,
            1.0990,
            1.1010,
        )
    }

    #[test]
    fn valid_series_passes() {
        let bars: Vec<Bar> = (0..5).map(sample_bar).collect();
        assert!(Bar::validate_series(&bars).is_ok());
    }

    #[test]
    fn nan_close_is_rejected() {
        let mut bar = sample_bar(0);
        bar.close = f64::NAN;
        assert_eq!(
            bar.check(7),
            Err(BarError::NonFinite {
                index: 7,
                field: PriceField::Close
            })
        );
    }

    #[test]
    fn infinite_high_is_rejected() {
        let mut bars: Vec<Bar> = (0..3).map(sample_bar).collect();
        bars[2].high = f64::INFINITY;
        assert!(matches!(
            Bar::validate_series(&bars),
            Err(BarError::NonFinite { index: 2, field: PriceField::High })
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut bar = sample_bar(0);
        bar.high = 1.0900;
        assert!(matches!(bar.check(0), Err(BarError::Inverted { .. })));
    }

    #[test]
    fn duplicate_timestamp_is_rejected() {
        let mut bars: Vec<Bar> = (0..3).map(sample_bar).collect();
        bars[2].timestamp = bars[1].timestamp;
        assert!(matches!(
            Bar::validate_series(&bars),
            Err(BarError::NonMonotonic { index: 2, .. })
        ));
    }

    #[test]
    fn backwards_timestamp_is_rejected() {
        let mut bars: Vec<Bar> = (0..3).map(sample_bar).collect();
        bars[1].timestamp = bars[0].timestamp - Duration::hours(1);
        assert!(matches!(
            Bar::validate_series(&bars),
            Err(BarError::NonMonotonic { index: 1, .. })
        ));
    }

    #[test]
    fn utc_hour_reads_timestamp() {
        assert_eq!(sample_bar(13).utc_hour(), 13);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar(5);
        let json = serde_json::to_string(&bar).unwrap();
        let back: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, back);
    }
}
