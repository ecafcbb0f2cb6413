//! Core entity structs: players, civilizations, galaxy regions, and the
//! performance counters the engine publishes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{AiTier, Importance, PlayerType, Priority};
use crate::ids::{CivilizationId, PlayerId, RegionId};

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// A registered player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Human or AI controlled.
    pub player_type: PlayerType,
    /// Budget importance (only meaningful for AI players).
    pub importance: Importance,
    /// Galaxy region (shard) the player is assigned to.
    pub region_id: RegionId,
    /// Civilization the player governs, if any.
    pub civilization_id: Option<CivilizationId>,
    /// Browser session the player joined from.
    pub session_id: Option<String>,
    /// Whether the player currently has a live connection.
    pub connected: bool,
    /// AI decision budget class.
    pub ai_tier: AiTier,
    /// When the player was registered.
    pub joined_at: DateTime<Utc>,
    /// Last time an action from this player was processed.
    pub last_activity: DateTime<Utc>,
    /// Total actions processed for this player.
    pub action_count: u64,
    /// Time of the most recent processed action.
    pub last_action_time: DateTime<Utc>,
    /// Exponential moving average of the gap between action batches.
    pub average_action_interval_ms: f64,
}

/// Registration request for a new player.
///
/// Only `name` is required. A missing `id` is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlayer {
    /// Caller-supplied identifier.
    #[serde(default)]
    pub id: Option<PlayerId>,
    /// Display name (must not be blank).
    pub name: String,
    /// Human or AI controlled (defaults to human).
    #[serde(default, rename = "type")]
    pub player_type: PlayerType,
    /// Budget importance for AI players.
    #[serde(default)]
    pub importance: Importance,
    /// Civilization to attach the player to.
    #[serde(default)]
    pub civilization_id: Option<CivilizationId>,
    /// Browser session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl NewPlayer {
    /// Convenience constructor for a named player of the given type.
    pub fn named(name: impl Into<String>, player_type: PlayerType) -> Self {
        Self {
            name: name.into(),
            player_type,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Civilizations
// ---------------------------------------------------------------------------

/// A civilization tracked by the engine.
///
/// The engine only cares about where it lives and who owns it; domain
/// modules keep their own state in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Civilization {
    /// Unique civilization identifier.
    pub id: CivilizationId,
    /// Region the civilization is counted against.
    pub region_id: RegionId,
    /// Players governing this civilization.
    pub owners: Vec<PlayerId>,
    /// When the engine first saw this civilization.
    pub created_at: DateTime<Utc>,
    /// Opaque domain data.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// A galaxy region: the unit of sharding for players and civilizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxyRegion {
    /// Region slug.
    pub id: RegionId,
    /// Display name.
    pub name: String,
    /// Maximum number of players the region accepts.
    pub capacity: u32,
    /// Players currently assigned.
    pub player_count: u32,
    /// Civilizations currently assigned.
    pub civilization_count: u32,
    /// Weight of AI work attributed to the region this quarter.
    pub ai_processing_load: f64,
}

impl GalaxyRegion {
    /// Create an empty region.
    pub fn new(id: impl Into<String>, name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: RegionId::new(id),
            name: name.into(),
            capacity,
            player_count: 0,
            civilization_count: 0,
            ai_processing_load: 0.0,
        }
    }

    /// Shard load used for player placement:
    /// `players + 0.5 * civilizations + ai_processing_load`.
    pub fn load(&self) -> f64 {
        f64::from(self.player_count) + 0.5 * f64::from(self.civilization_count) + self.ai_processing_load
    }

    /// Whether another player can be assigned here.
    pub const fn has_capacity(&self) -> bool {
        self.player_count < self.capacity
    }
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// Per-priority queue depths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepths {
    /// Actions waiting in the critical queue.
    pub critical: usize,
    /// Actions waiting in the high queue.
    pub high: usize,
    /// Actions waiting in the medium queue.
    pub medium: usize,
    /// Actions waiting in the low queue.
    pub low: usize,
    /// Actions waiting in the batch queue.
    pub batch: usize,
}

impl QueueDepths {
    /// Depth of a single priority queue.
    pub const fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
            Priority::Batch => self.batch,
        }
    }

    /// Mutable access to a single priority queue's depth.
    pub const fn get_mut(&mut self, priority: Priority) -> &mut usize {
        match priority {
            Priority::Critical => &mut self.critical,
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
            Priority::Batch => &mut self.batch,
        }
    }

    /// Sum over all queues.
    pub const fn total(&self) -> usize {
        self.critical
            .saturating_add(self.high)
            .saturating_add(self.medium)
            .saturating_add(self.low)
            .saturating_add(self.batch)
    }
}

/// Engine performance counters.
///
/// Published on every quarter tick and by the performance monitor, and
/// embedded in every game-state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Exponential moving average of a processing pass, in milliseconds.
    pub avg_tick_time_ms: f64,
    /// Actions processed per second over the last pass.
    pub processed_actions_per_second: f64,
    /// Actions processed since start.
    pub processed_actions_total: u64,
    /// AI-backed calls spent this quarter, keyed by tier label.
    pub ai_calls_this_quarter: BTreeMap<String, u64>,
    /// Rule-based decisions made this quarter.
    pub rule_based_decisions_this_quarter: u64,
    /// Cache hit rate in `[0, 1]`.
    pub cache_hit_rate: f64,
    /// Players active within the activity threshold.
    pub active_player_count: usize,
    /// All registered players.
    pub total_player_count: usize,
    /// Current backlog per priority.
    pub queue_depths: QueueDepths,
    /// Current backlog across all priorities.
    pub total_queued: usize,
    /// Actions rejected because their queue was full.
    pub shed_actions: u64,
    /// Batches that finished after their priority deadline.
    pub missed_batch_deadlines: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn region_load_weighs_civilizations_at_half() {
        let mut region = GalaxyRegion::new("mid-rim", "Mid Rim", 10);
        region.player_count = 2;
        region.civilization_count = 3;
        region.ai_processing_load = 0.25;
        assert!((region.load() - 3.75).abs() < f64::EPSILON);
    }

    #[test]
    fn region_capacity_is_exclusive_upper_bound() {
        let mut region = GalaxyRegion::new("core-worlds", "Core Worlds", 1);
        assert!(region.has_capacity());
        region.player_count = 1;
        assert!(!region.has_capacity());
    }

    #[test]
    fn queue_depths_total_and_lookup() {
        let mut depths = QueueDepths::default();
        *depths.get_mut(Priority::Critical) = 5;
        *depths.get_mut(Priority::Batch) = 2;
        assert_eq!(depths.get(Priority::Critical), 5);
        assert_eq!(depths.total(), 7);
    }

    #[test]
    fn new_player_deserializes_with_defaults() {
        let json = r#"{"name":"Bob","type":"ai"}"#;
        let parsed: NewPlayer = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.name, "Bob");
        assert_eq!(parsed.player_type, PlayerType::Ai);
        assert_eq!(parsed.importance, Importance::Normal);
        assert!(parsed.id.is_none());
    }
}
