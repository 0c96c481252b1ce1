/// Ratchet invariant enforcement
///
/// **Core Rule:** Stops may tighten, never loosen.
use crate::domain::Direction;

/// Ratchet state for stop-loss management
///
/// Enforces the invariant that stops can only move in the favorable direction:
/// - Long trades: stop can only rise (tighten)
/// - Short trades: stop can only fall (tighten)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatchetState {
    level: f64,
    direction: Direction,
}

impl RatchetState {
    pub fn new(direction: Direction, initial_level: f64) -> Self {
        Self {
            level: initial_level,
            direction,
        }
    }

    /// Apply ratchet to a proposed stop level
    ///
    /// Returns the ratcheted level (can only tighten, never loosen).
    ///
    /// # Example
    /// ```
    /// use signalforge_core::domain::Direction;
    /// use signalforge_core::position_management::RatchetState;
    ///
    /// let mut ratchet = RatchetState::new(Direction::Long, 95.0);
    /// assert_eq!(ratchet.apply(100.0), 100.0);
    /// assert_eq!(ratchet.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        if self.direction.is_tighter(proposed, self.level) {
            self.level = proposed;
        }
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}
