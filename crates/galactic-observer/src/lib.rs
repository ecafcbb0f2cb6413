//! Observer API server for the galactic simulation engine.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/events`) streaming every
//!   [`EngineEvent`] the engine publishes
//! - **REST endpoints** for reading game state, registering and removing
//!   players, and queueing actions
//! - **Minimal HTML status page** (`GET /`) showing the game day,
//!   quarter, players and queue backlog
//!
//! # Architecture
//!
//! Handlers hold a clone of the [`ScalableSimulationEngine`] handle and
//! call straight into it. Reads take the engine's registry lock briefly
//! and never block the clock timers. `WebSocket` clients subscribe to the
//! engine's broadcast channel; lagging clients skip ahead.
//!
//! [`EngineEvent`]: galactic_types::EngineEvent
//! [`ScalableSimulationEngine`]: galactic_core::ScalableSimulationEngine

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
