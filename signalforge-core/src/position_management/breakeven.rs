//! Breakeven lock: the trailing-stop rule.
//!
//! Phase 1 (`NotArmed`): favourable excursion below `arm_at_r`; stop untouched.
//! Phase 2 (`Armed`): excursion reached `arm_at_r`; stop still untouched.
//! Phase 3 (`LockedBreakeven`): excursion reached `trigger_r`; stop moves to
//!          entry + `lock_fraction` R in the favourable direction.
//!
//! Phases only move forward. A single bar may jump from phase 1 to phase 3.

use crate::domain::{Trade, TrailingPhase};
use crate::params::{finite, ParamError};
use serde::{Deserialize, Serialize};

/// Tolerance, in R, when comparing excursion against phase thresholds.
pub const R_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingRule {
    arm_at_r: f64,
    trigger_r: f64,
    lock_fraction: f64,
}

impl TrailingRule {
    /// Requires `0 < arm_at_r <= trigger_r` and `0 <= lock_fraction < trigger_r`.
    pub fn new(arm_at_r: f64, trigger_r: f64, lock_fraction: f64) -> Result<Self, ParamError> {
        let arm_at_r = finite("arm_at_r", arm_at_r)?;
        let trigger_r = finite("trigger_r", trigger_r)?;
        let lock_fraction = finite("lock_fraction", lock_fraction)?;
        if arm_at_r <= 0.0 {
            return Err(ParamError::NotPositive {
                field: "arm_at_r",
                value: arm_at_r,
            });
        }
        if trigger_r < arm_at_r {
            return Err(ParamError::OutOfRange {
                field: "trigger_r",
                value: trigger_r,
                min: arm_at_r,
                max: f64::MAX,
            });
        }
        if lock_fraction < 0.0 || lock_fraction >= trigger_r {
            return Err(ParamError::OutOfRange {
                field: "lock_fraction",
                value: lock_fraction,
                min: 0.0,
                max: trigger_r,
            });
        }
        Ok(Self {
            arm_at_r,
            trigger_r,
            lock_fraction,
        })
    }

    pub fn arm_at_r(&self) -> f64 {
        self.arm_at_r
    }

    pub fn trigger_r(&self) -> f64 {
        self.trigger_r
    }

    pub fn lock_fraction(&self) -> f64 {
        self.lock_fraction
    }

    /// Phase implied by a favourable excursion of `excursion_r`.
    pub fn phase_for(&self, excursion_r: f64) -> TrailingPhase {
        if excursion_r + R_EPSILON >= self.trigger_r {
            TrailingPhase::LockedBreakeven
        } else if excursion_r + R_EPSILON >= self.arm_at_r {
            TrailingPhase::Armed
        } else {
            TrailingPhase::NotArmed
        }
    }

    /// Stop level the lock moves to for `trade`.
    pub fn lock_level(&self, trade: &Trade) -> f64 {
        trade.entry_price + trade.direction.sign() * self.lock_fraction * trade.risk_distance
    }
}

impl Default for TrailingRule {
    fn default() -> Self {
        Self {
            arm_at_r: 1.0,
            trigger_r: 1.5,
            lock_fraction: 0.2,
        }
    }
}
