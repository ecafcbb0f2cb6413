//! Enumeration types shared by the engine and its embedding layers.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Who controls a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerType {
    /// A person connected through the browser client.
    #[default]
    Human,
    /// A computer-controlled civilization.
    Ai,
}

/// How much attention an AI player deserves from the decision budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    /// Background civilization.
    #[default]
    Normal,
    /// Major rival or story-relevant civilization.
    High,
}

/// Budget class controlling how many AI-backed decisions a player may
/// consume per quarter before falling back to rule-based decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTier {
    /// Premium budget for active human players.
    Tier1,
    /// Standard budget for important AI civilizations.
    Tier2,
    /// Basic budget for background civilizations.
    Tier3,
}

impl AiTier {
    /// All tiers in budget order.
    pub const ALL: [Self; 3] = [Self::Tier1, Self::Tier2, Self::Tier3];

    /// Pick the tier for a new player.
    ///
    /// Humans get tier 1, high-importance AI players tier 2, everyone else
    /// tier 3.
    pub const fn for_player(player_type: PlayerType, importance: Importance) -> Self {
        match (player_type, importance) {
            (PlayerType::Human, _) => Self::Tier1,
            (PlayerType::Ai, Importance::High) => Self::Tier2,
            (PlayerType::Ai, Importance::Normal) => Self::Tier3,
        }
    }

    /// Stable label used in logs and cache keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tier1 => "tier1",
            Self::Tier2 => "tier2",
            Self::Tier3 => "tier3",
        }
    }

    /// Position in [`AiTier::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Tier1 => 0,
            Self::Tier2 => 1,
            Self::Tier3 => 2,
        }
    }
}

impl fmt::Display for AiTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tier1" => Ok(Self::Tier1),
            "tier2" => Ok(Self::Tier2),
            "tier3" => Ok(Self::Tier3),
            other => Err(UnknownTier(other.to_owned())),
        }
    }
}

/// Error returned when a tier label is not `tier1`, `tier2` or `tier3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTier(pub String);

impl fmt::Display for UnknownTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown ai tier: {}", self.0)
    }
}

impl std::error::Error for UnknownTier {}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Processing priority class of a queued action.
///
/// The declaration order is the drain order: critical work is always
/// serviced before high, high before medium, and so on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Player-facing actions (target latency 100ms).
    Critical,
    /// Economic and daily updates (1s).
    High,
    /// AI decisions (10s).
    #[default]
    Medium,
    /// Background simulation (60s).
    Low,
    /// Quarterly roll-ups (90s).
    Batch,
}

impl Priority {
    /// All priorities in strict drain order.
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Batch,
    ];

    /// Lowercase name, matching the wire format.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Batch => "batch",
        }
    }

    /// Position in [`Priority::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::Batch => 4,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a priority name is not one of the five classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(pub String);

impl fmt::Display for UnknownPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown priority: {}", self.0)
    }
}

impl std::error::Error for UnknownPriority {}

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "batch" => Ok(Self::Batch),
            other => Err(UnknownPriority(other.to_owned())),
        }
    }
}

/// The kind of a queued action, derived from its payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// A command issued by a player.
    PlayerAction,
    /// A decision request for an AI-controlled player.
    AiDecision,
    /// A regional economic recalculation.
    EconomicUpdate,
    /// Work scheduled by the day tick.
    DailyUpdate,
    /// Work scheduled by the quarter tick.
    QuarterlyUpdate,
}

impl ActionKind {
    /// Kebab-case label used in logs and batch keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlayerAction => "player-action",
            Self::AiDecision => "ai-decision",
            Self::EconomicUpdate => "economic-update",
            Self::DailyUpdate => "daily-update",
            Self::QuarterlyUpdate => "quarterly-update",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    /// The budgeted AI model answered.
    Ai,
    /// A previous AI answer was reused from the cache.
    Cached,
    /// The instant rule-based fallback answered.
    Rules,
}

impl DecisionMethod {
    /// Label for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Cached => "cached",
            Self::Rules => "rules",
        }
    }
}
