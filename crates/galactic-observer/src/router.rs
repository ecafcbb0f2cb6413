//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin client access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/events` -- `WebSocket` engine event stream
/// - `GET /api/health` -- liveness and lifecycle flags
/// - `GET /api/state` -- full game state
/// - `POST /api/players` -- register a player
/// - `GET /api/players/{id}` -- one player's game state
/// - `DELETE /api/players/{id}` -- remove a player
/// - `POST /api/actions` -- queue an action
/// - `GET /api/budgets/{tier}` -- remaining AI budget of a tier
///
/// CORS is configured to allow any origin. In production this should be
/// restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/events", get(ws::ws_events))
        // REST API
        .route("/api/health", get(handlers::health))
        .route("/api/state", get(handlers::get_state))
        .route("/api/players", post(handlers::create_player))
        .route(
            "/api/players/{id}",
            get(handlers::get_player).delete(handlers::delete_player),
        )
        .route("/api/actions", post(handlers::queue_action))
        .route("/api/budgets/{tier}", get(handlers::get_budget))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
