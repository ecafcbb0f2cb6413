//! Shared type definitions for the galactic simulation engine.
//!
//! This crate is the single source of truth for the types that cross the
//! boundary between the engine core, the observer API, and the domain
//! modules that embed the engine.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers for players, civilizations, actions, regions
//! - [`enums`] -- Player types, AI tiers, priority classes, action kinds
//! - [`structs`] -- Players, civilizations, galaxy regions, performance counters
//! - [`actions`] -- Queued actions, typed payloads, resolved decisions
//! - [`events`] -- Engine lifecycle events

pub mod actions;
pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::{
    Action, ActionPayload, ActionRequest, AiDecisionPayload, DailyUpdatePayload, Decision,
    EconomicUpdatePayload, PlayerActionPayload, QuarterlyUpdatePayload,
};
pub use enums::{
    ActionKind, AiTier, DecisionMethod, Importance, PlayerType, Priority, UnknownPriority,
    UnknownTier,
};
pub use events::EngineEvent;
pub use ids::{ActionId, CivilizationId, PlayerId, RegionId};
pub use structs::{
    Civilization, GalaxyRegion, NewPlayer, PerformanceSnapshot, Player, QueueDepths,
};
