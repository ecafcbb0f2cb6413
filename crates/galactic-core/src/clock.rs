//! Game clock for the galactic simulation.
//!
//! The clock is the single source of truth for game time. Game days and
//! quarters advance on wall-clock timers owned by the engine; the clock
//! only counts them and remembers when each boundary happened.
//!
//! All counters use checked arithmetic (no silent overflow).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// A counter would overflow.
    #[error("{counter} counter overflow: cannot advance beyond u64::MAX")]
    Overflow {
        /// Which counter overflowed.
        counter: &'static str,
    },

    /// Invalid timing configuration (e.g. a zero tick rate).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Serializable view of the clock, embedded in game snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    /// Day ticks processed since start.
    pub current_tick: u64,
    /// Current game day.
    pub current_game_day: u64,
    /// Current game quarter.
    pub current_quarter: u64,
    /// Wall-clock time of the last day boundary.
    pub last_day_tick: DateTime<Utc>,
    /// Wall-clock time of the last quarter boundary.
    pub last_quarter_tick: DateTime<Utc>,
    /// Wall-clock time the engine was started.
    pub game_start_time: DateTime<Utc>,
}

/// Game clock counting days and quarters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    current_tick: u64,
    current_game_day: u64,
    current_quarter: u64,
    last_day_tick: DateTime<Utc>,
    last_quarter_tick: DateTime<Utc>,
    game_start_time: DateTime<Utc>,
    days_per_quarter: u64,
}

impl SimulationClock {
    /// Create a clock at day 0, quarter 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if either rate is zero.
    pub fn new(day_tick_rate_ms: u64, quarter_tick_rate_ms: u64) -> Result<Self, ClockError> {
        if day_tick_rate_ms == 0 || quarter_tick_rate_ms == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "tick rates must be at least 1ms".to_owned(),
            });
        }
        let days_per_quarter = quarter_tick_rate_ms
            .checked_div(day_tick_rate_ms)
            .unwrap_or(1)
            .max(1);
        let now = Utc::now();
        Ok(Self {
            current_tick: 0,
            current_game_day: 0,
            current_quarter: 0,
            last_day_tick: now,
            last_quarter_tick: now,
            game_start_time: now,
            days_per_quarter,
        })
    }

    /// Reset the wall-clock anchors to `now`. Called when the engine starts.
    pub const fn anchor(&mut self, now: DateTime<Utc>) {
        self.last_day_tick = now;
        self.last_quarter_tick = now;
        self.game_start_time = now;
    }

    /// Advance one game day. Returns the new game day.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if the day or tick counter would
    /// exceed `u64::MAX`.
    pub fn advance_day(&mut self, now: DateTime<Utc>) -> Result<u64, ClockError> {
        let day = self
            .current_game_day
            .checked_add(1)
            .ok_or(ClockError::Overflow { counter: "game day" })?;
        let tick = self
            .current_tick
            .checked_add(1)
            .ok_or(ClockError::Overflow { counter: "tick" })?;
        self.current_game_day = day;
        self.current_tick = tick;
        self.last_day_tick = now;
        Ok(day)
    }

    /// Advance one game quarter. Returns the new quarter.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if the quarter counter would exceed
    /// `u64::MAX`.
    pub fn advance_quarter(&mut self, now: DateTime<Utc>) -> Result<u64, ClockError> {
        self.current_quarter = self
            .current_quarter
            .checked_add(1)
            .ok_or(ClockError::Overflow { counter: "quarter" })?;
        self.last_quarter_tick = now;
        Ok(self.current_quarter)
    }

    /// Day ticks processed since start.
    pub const fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Current game day.
    pub const fn current_game_day(&self) -> u64 {
        self.current_game_day
    }

    /// Current game quarter.
    pub const fn current_quarter(&self) -> u64 {
        self.current_quarter
    }

    /// Nominal number of game days in a quarter.
    pub const fn days_per_quarter(&self) -> u64 {
        self.days_per_quarter
    }

    /// Wall-clock time of the last day boundary.
    pub const fn last_day_tick(&self) -> DateTime<Utc> {
        self.last_day_tick
    }

    /// Wall-clock time of the last quarter boundary.
    pub const fn last_quarter_tick(&self) -> DateTime<Utc> {
        self.last_quarter_tick
    }

    /// Wall-clock time the clock was last anchored.
    pub const fn game_start_time(&self) -> DateTime<Utc> {
        self.game_start_time
    }

    /// Wall-clock time since the clock was anchored (zero if `now` is
    /// earlier).
    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.game_start_time)
            .to_std()
            .unwrap_or_default()
    }

    /// Serializable view of the clock.
    pub const fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            current_tick: self.current_tick,
            current_game_day: self.current_game_day,
            current_quarter: self.current_quarter,
            last_day_tick: self.last_day_tick,
            last_quarter_tick: self.last_quarter_tick,
            game_start_time: self.game_start_time,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn new_clock_starts_at_zero() {
        let clock = SimulationClock::new(1000, 90_000).unwrap();
        assert_eq!(clock.current_tick(), 0);
        assert_eq!(clock.current_game_day(), 0);
        assert_eq!(clock.current_quarter(), 0);
        assert_eq!(clock.days_per_quarter(), 90);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(SimulationClock::new(0, 90_000).is_err());
        assert!(SimulationClock::new(1000, 0).is_err());
    }

    #[test]
    fn advance_day_moves_day_and_tick_together() {
        let mut clock = SimulationClock::new(100, 900).unwrap();
        let now = Utc::now();
        assert_eq!(clock.advance_day(now).unwrap(), 1);
        assert_eq!(clock.advance_day(now).unwrap(), 2);
        assert_eq!(clock.current_tick(), 2);
        assert_eq!(clock.last_day_tick(), now);
        assert_eq!(clock.current_quarter(), 0);
    }

    #[test]
    fn advance_quarter_leaves_day_alone() {
        let mut clock = SimulationClock::new(100, 900).unwrap();
        let now = Utc::now();
        clock.advance_day(now).unwrap();
        assert_eq!(clock.advance_quarter(now).unwrap(), 1);
        assert_eq!(clock.current_game_day(), 1);
    }

    #[test]
    fn day_overflow_is_an_error() {
        let mut clock = SimulationClock::new(100, 900).unwrap();
        clock.current_game_day = u64::MAX;
        let result = clock.advance_day(Utc::now());
        assert!(matches!(result, Err(ClockError::Overflow { counter: "game day" })));
        assert_eq!(clock.current_tick(), 0);
    }

    #[test]
    fn uptime_counts_from_anchor() {
        let mut clock = SimulationClock::new(100, 900).unwrap();
        let start = Utc::now();
        clock.anchor(start);
        let later = start + TimeDelta::seconds(3);
        assert_eq!(clock.uptime(later), Duration::from_secs(3));
        assert_eq!(clock.uptime(start - TimeDelta::seconds(1)), Duration::ZERO);
    }
}
