//! Queued actions and resolved decisions.
//!
//! Every unit of work that flows through the engine's priority queues is
//! an [`Action`]. Its payload is a closed set of typed variants so the
//! dispatcher can match exhaustively on [`ActionKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ActionKind, AiTier, DecisionMethod, Priority};
use crate::ids::{ActionId, PlayerId, RegionId};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A command issued by a player (build, trade, research, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerActionPayload {
    /// The acting player.
    pub player_id: PlayerId,
    /// Domain command name, interpreted by the domain hooks.
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A request for an AI-controlled player to make a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiDecisionPayload {
    /// The player the decision is for.
    pub player_id: PlayerId,
    /// Situation summary handed to the decision model. Identical contexts
    /// for the same tier share a cached answer.
    pub context: String,
}

/// A regional economic recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicUpdatePayload {
    /// Region to recalculate; `None` means galaxy-wide.
    #[serde(default)]
    pub region_id: Option<RegionId>,
    /// Free-form indicators supplied by the economic modules.
    #[serde(default)]
    pub indicators: serde_json::Value,
}

/// Daily work scheduled by the day tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUpdatePayload {
    /// The game day that just started.
    pub game_day: u64,
}

/// Quarterly work scheduled by the quarter tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterlyUpdatePayload {
    /// The quarter that just started.
    pub quarter: u64,
}

/// Typed payload of a queued action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionPayload {
    /// See [`PlayerActionPayload`].
    PlayerAction(PlayerActionPayload),
    /// See [`AiDecisionPayload`].
    AiDecision(AiDecisionPayload),
    /// See [`EconomicUpdatePayload`].
    EconomicUpdate(EconomicUpdatePayload),
    /// See [`DailyUpdatePayload`].
    DailyUpdate(DailyUpdatePayload),
    /// See [`QuarterlyUpdatePayload`].
    QuarterlyUpdate(QuarterlyUpdatePayload),
}

impl ActionPayload {
    /// The action kind this payload belongs to.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::PlayerAction(_) => ActionKind::PlayerAction,
            Self::AiDecision(_) => ActionKind::AiDecision,
            Self::EconomicUpdate(_) => ActionKind::EconomicUpdate,
            Self::DailyUpdate(_) => ActionKind::DailyUpdate,
            Self::QuarterlyUpdate(_) => ActionKind::QuarterlyUpdate,
        }
    }

    /// The player this payload concerns, if any.
    pub const fn player_id(&self) -> Option<PlayerId> {
        match self {
            Self::PlayerAction(p) => Some(p.player_id),
            Self::AiDecision(p) => Some(p.player_id),
            Self::EconomicUpdate(_) | Self::DailyUpdate(_) | Self::QuarterlyUpdate(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// An action as submitted by a caller.
///
/// The priority is carried as a name so that requests arriving over the
/// wire with an unknown class can be logged and dropped instead of
/// failing deserialization. A missing priority means `medium`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Priority class name (`critical`, `high`, `medium`, `low`, `batch`).
    #[serde(default)]
    pub priority: Option<String>,
    /// Region the action belongs to, used for batching. Player actions and
    /// AI decisions always batch by the player's registered region.
    #[serde(default)]
    pub region_id: Option<RegionId>,
    /// The work to perform.
    pub payload: ActionPayload,
}

impl ActionRequest {
    /// Build a request with an explicit priority.
    pub fn new(priority: Priority, payload: ActionPayload) -> Self {
        Self {
            priority: Some(priority.as_str().to_owned()),
            region_id: None,
            payload,
        }
    }

    /// Build a request with a raw priority name.
    pub fn with_priority_name(priority: impl Into<String>, payload: ActionPayload) -> Self {
        Self {
            priority: Some(priority.into()),
            region_id: None,
            payload,
        }
    }
}

/// An action stamped by the engine and waiting in a priority queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique action identifier.
    pub id: ActionId,
    /// Resolved priority class.
    pub priority: Priority,
    /// Region the action belongs to, if known.
    pub region_id: Option<RegionId>,
    /// The work to perform.
    pub payload: ActionPayload,
    /// Wall-clock time the action was queued.
    pub enqueued_at: DateTime<Utc>,
    /// Game day at the moment the action was queued.
    pub game_day: u64,
}

impl Action {
    /// The action kind, derived from the payload.
    pub const fn kind(&self) -> ActionKind {
        self.payload.kind()
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// The answer to an [`AiDecisionPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// The action that requested the decision.
    pub action_id: ActionId,
    /// The player the decision is for.
    pub player_id: PlayerId,
    /// Budget tier the player belongs to.
    pub tier: AiTier,
    /// Decision text.
    pub decision: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Which path produced the decision.
    pub method: DecisionMethod,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_matches_variant() {
        let player_id = PlayerId::new();
        let payload = ActionPayload::AiDecision(AiDecisionPayload {
            player_id,
            context: String::from("border dispute"),
        });
        assert_eq!(payload.kind(), ActionKind::AiDecision);
        assert_eq!(payload.player_id(), Some(player_id));

        let daily = ActionPayload::DailyUpdate(DailyUpdatePayload { game_day: 3 });
        assert_eq!(daily.kind(), ActionKind::DailyUpdate);
        assert_eq!(daily.player_id(), None);
    }

    #[test]
    fn payload_is_tagged_by_kind() {
        let payload = ActionPayload::QuarterlyUpdate(QuarterlyUpdatePayload { quarter: 2 });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "quarterly-update");
        assert_eq!(json["quarter"], 2);
    }

    #[test]
    fn request_without_priority_deserializes() {
        let player_id = PlayerId::new();
        let json = serde_json::json!({
            "payload": {
                "type": "player-action",
                "player_id": player_id,
                "command": "build-shipyard"
            }
        });
        let request: ActionRequest = serde_json::from_value(json).unwrap();
        assert!(request.priority.is_none());
        assert_eq!(request.payload.kind(), ActionKind::PlayerAction);
    }

    #[test]
    fn request_keeps_unknown_priority_name() {
        let request = ActionRequest::with_priority_name(
            "urgent",
            ActionPayload::DailyUpdate(DailyUpdatePayload { game_day: 1 }),
        );
        assert_eq!(request.priority.as_deref(), Some("urgent"));
    }
}
