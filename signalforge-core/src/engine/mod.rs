//! Live trade tracking: the monitor that owns open trades and the stores
//! it persists through.

pub mod monitor;
pub mod store;

pub use monitor::{MonitorError, TradeMonitor, TrailingStats};
pub use store::{JsonFileStore, MemoryStore, StoreError, TradeBook, TradeStore, HISTORY_LIMIT};
