//! Content hashing of bar data.
//!
//! Together with `ParameterSet::fingerprint()` this identifies a backtest
//! run: same dataset hash + same parameter hash → same result.

use crate::domain::{Bar, DatasetHash};

/// BLAKE3 over every bar's timestamp and OHLCV, in order.
pub fn dataset_hash(bars: &[Bar]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(bars.len() as u64).to_le_bytes());
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&value.to_bits().to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}
