//! Domain types for SignalForge

pub mod bar;
pub mod ids;
pub mod instrument;
pub mod signal;
pub mod trade;

pub use bar::{Bar, BarError, PriceField};
pub use ids::{DatasetHash, ParamHash, TradeId};
pub use instrument::Instrument;
pub use signal::{Direction, Signal, SignalContext};
pub use trade::{
    ExitReason, StopAdjustment, Trade, TradeStatus, TrailingPhase, BREAKEVEN_BAND_R,
};
