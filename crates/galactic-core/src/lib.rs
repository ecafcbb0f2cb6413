//! Game clock, priority scheduling, AI budgeting, and sharding for the
//! galactic simulation.
//!
//! The [`ScalableSimulationEngine`] advances game days and quarters on
//! wall-clock timers while a separate loop drains five priority queues of
//! player, AI, and economic work. Model-backed AI decisions are rationed
//! per tier and quarter; once a tier's budget is spent, decisions fall
//! back to instant rules.
//!
//! # Modules
//!
//! - [`ai`] -- Budgeted decision processor and decision models.
//! - [`batcher`] -- Groups drained actions by kind, priority and region.
//! - [`cache`] -- LFU cache for AI decisions.
//! - [`clock`] -- Game day and quarter counters.
//! - [`config`] -- Configuration loading from `galactic-config.yaml`.
//! - [`engine`] -- The engine handle, timers and processing loop.
//! - [`error`] -- [`EngineError`].
//! - [`events`] -- Broadcast bus for engine events.
//! - [`hooks`] -- Domain extension points.
//! - [`monitor`] -- Periodic performance reporting.
//! - [`persist`] -- Game snapshots and state stores.
//! - [`queue`] -- Bounded per-priority queues.
//! - [`regions`] -- Galaxy regions and player placement.
//!
//! [`ScalableSimulationEngine`]: engine::ScalableSimulationEngine
//! [`EngineError`]: error::EngineError

pub mod ai;
pub mod batcher;
pub mod cache;
pub mod clock;
pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod hooks;
pub mod monitor;
pub mod persist;
pub mod queue;
pub mod regions;

pub use ai::{AdaptiveAiProcessor, DecisionError, DecisionModel, SimulatedModel};
pub use config::{ConfigError, EngineConfig};
pub use engine::{GameState, PlayerGameState, ScalableSimulationEngine};
pub use error::EngineError;
pub use hooks::{EngineHooks, HookError, NoOpHooks};
pub use persist::{GameSnapshot, JsonFileStore, StateStore};
pub use queue::EnqueueOutcome;
