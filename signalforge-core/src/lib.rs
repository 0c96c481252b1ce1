//! SignalForge Core: indicators, entry scoring, risk sizing, trailing stops
//! and live trade tracking.
//!
//! This crate holds everything that decides and manages a trade:
//! - Domain types (bars, signals, trades, instruments, ids)
//! - Indicator implementations with precomputed, warm-up-aware series
//! - Weighted buy/sell scoring and the accept decision
//! - ATR-based stop, target and position sizing
//! - Trailing-stop state machine with a one-way ratchet
//! - Trade monitor with JSON persistence
//! - Signal pipeline gating market hours, cooldown, veto and alerts

pub mod components;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod params;
pub mod pipeline;
pub mod position_management;
pub mod sizers;
