//! Lifecycle notifications published by the engine.
//!
//! Subscribers receive these over a broadcast channel. The serialized form
//! is what the observer pushes to `WebSocket` clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;
use crate::structs::{PerformanceSnapshot, Player};

/// An event emitted by the simulation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Regions and subsystems are ready.
    Initialized,
    /// Timers and the processing loop are running.
    Started,
    /// Timers are cancelled and the final save is done.
    Stopped,
    /// A game day elapsed.
    DayTick {
        /// The new game day.
        game_day: u64,
        /// Wall-clock time of the tick.
        real_time: DateTime<Utc>,
        /// Players active within the activity threshold.
        active_players: usize,
    },
    /// A game quarter elapsed. AI budgets are already reset.
    QuarterTick {
        /// The new quarter.
        quarter: u64,
        /// Game day at the quarter boundary.
        game_day: u64,
        /// Wall-clock time of the tick.
        real_time: DateTime<Utc>,
        /// Performance counters at the boundary.
        performance: PerformanceSnapshot,
    },
    /// A player joined.
    PlayerAdded {
        /// The registered player.
        player: Player,
    },
    /// A player left.
    PlayerRemoved {
        /// The removed player's id.
        player_id: PlayerId,
    },
    /// Periodic performance sample.
    PerformanceMetrics {
        /// The sampled counters.
        performance: PerformanceSnapshot,
    },
    /// A processing pass failed; the engine keeps running.
    Error {
        /// Rendered error message.
        message: String,
    },
}

impl EngineEvent {
    /// Short name of the event, for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::DayTick { .. } => "dayTick",
            Self::QuarterTick { .. } => "quarterTick",
            Self::PlayerAdded { .. } => "playerAdded",
            Self::PlayerRemoved { .. } => "playerRemoved",
            Self::PerformanceMetrics { .. } => "performanceMetrics",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn day_tick_serializes_with_event_tag() {
        let event = EngineEvent::DayTick {
            game_day: 7,
            real_time: Utc::now(),
            active_players: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "dayTick");
        assert_eq!(json["game_day"], 7);
        assert_eq!(event.name(), "dayTick");
    }

    #[test]
    fn unit_events_round_trip() {
        let json = serde_json::to_string(&EngineEvent::Started).unwrap();
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EngineEvent::Started);
    }
}
