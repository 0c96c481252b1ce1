/// Position management: the per-bar trade state transition.
///
/// **Key Design Principles:**
/// 1. `advance_trade` is a pure function: trade + bar in, new trade + events out
/// 2. **Ratchet invariant**: stops may tighten, never loosen
/// 3. Exits are checked against the stop in force at the bar's open; stop
///    moves computed on a bar first protect the next bar
///
/// **Module Structure:**
/// - `ratchet`: Ratchet state enforcement
/// - `breakeven`: `TrailingRule` phase thresholds and lock level
/// - `advance`: exit checks, intrabar tie-break, phase transitions
pub mod advance;
pub mod breakeven;
pub mod ratchet;

pub use advance::{advance_trade, IntrabarPolicy, TradeEvent, TradeUpdate};
pub use breakeven::TrailingRule;
pub use ratchet::RatchetState;
