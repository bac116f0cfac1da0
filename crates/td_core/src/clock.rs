//! The simulation clock.
//!
//! Every timer in the core (attack cooldowns, removal grace periods) reads
//! this clock. It only moves when the simulation ticks, so runs replay
//! identically regardless of wall-clock time.

use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// A point in simulated time, in milliseconds since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// The moment the simulation starts.
    pub const ZERO: Self = Self(0);

    /// Create a time from milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Milliseconds since start.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

/// Explicitly advanced simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    now: SimTime,
    tick: u64,
    tick_ms: u64,
}

impl SimClock {
    /// Create a clock at time zero with the given step length.
    #[must_use]
    pub const fn new(tick_ms: u64) -> Self {
        Self {
            now: SimTime::ZERO,
            tick: 0,
            tick_ms,
        }
    }

    /// Current simulated time.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Step length in milliseconds.
    #[must_use]
    pub const fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Step length in seconds, as used by velocity integration.
    #[must_use]
    pub fn dt_seconds(&self) -> Fixed {
        Fixed::from_num(self.tick_ms) / Fixed::from_num(1000)
    }

    /// Move the clock forward by one tick.
    pub fn advance(&mut self) {
        self.tick += 1;
        self.now = SimTime(self.now.0 + self.tick_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_by_tick_length() {
        let mut clock = SimClock::new(50);
        clock.advance();
        clock.advance();
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.now(), SimTime::from_millis(100));
    }

    #[test]
    fn test_dt_seconds() {
        let clock = SimClock::new(500);
        assert_eq!(clock.dt_seconds(), Fixed::from_num(0.5));
    }
}
