//! Shared application state for the Observer API server.

use galactic_core::ScalableSimulationEngine;
use galactic_types::EngineEvent;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the running engine.
    pub engine: ScalableSimulationEngine,
}

impl AppState {
    /// Wrap an engine handle.
    pub const fn new(engine: ScalableSimulationEngine) -> Self {
        Self { engine }
    }

    /// Subscribe to the engine's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.subscribe()
    }
}
