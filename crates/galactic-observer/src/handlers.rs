//! REST API endpoint handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/health` | Liveness and lifecycle flags |
//! | `GET` | `/api/state` | Full game state |
//! | `POST` | `/api/players` | Register a player |
//! | `GET` | `/api/players/{id}` | One player's game state |
//! | `DELETE` | `/api/players/{id}` | Remove a player |
//! | `POST` | `/api/actions` | Queue an action |
//! | `GET` | `/api/budgets/{tier}` | Remaining AI budget of a tier |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use galactic_core::EnqueueOutcome;
use galactic_types::{ActionRequest, AiTier, NewPlayer, PlayerId};
use tracing::info;
use uuid::Uuid;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing engine status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let game = state.engine.game_state().await;
    let status = if game.running { "RUNNING" } else { "STOPPED" };
    let day = game.current_game_day;
    let quarter = game.current_quarter;
    let players = game.total_players;
    let active = game.active_players;
    let queued = game.performance.total_queued;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Galactic Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Galactic Observer</h1>
    <p>Status: <span class="status">{status}</span></p>

    <div>
        <div class="metric"><div class="label">Day</div><div class="value">{day}</div></div>
        <div class="metric"><div class="label">Quarter</div><div class="value">{quarter}</div></div>
        <div class="metric"><div class="label">Players</div><div class="value">{players}</div></div>
        <div class="metric"><div class="label">Active</div><div class="value">{active}</div></div>
        <div class="metric"><div class="label">Queued</div><div class="value">{queued}</div></div>
    </div>

    <ul>
        <li>GET <a href="/api/health">/api/health</a></li>
        <li>GET <a href="/api/state">/api/state</a></li>
        <li>POST /api/players</li>
        <li>GET / DELETE /api/players/{{id}}</li>
        <li>POST /api/actions</li>
        <li>GET /api/budgets/{{tier}}</li>
        <li>WS /ws/events</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/health, GET /api/state
// ---------------------------------------------------------------------------

/// Liveness check with lifecycle flags.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "initialized": state.engine.is_initialized(),
        "running": state.engine.is_running(),
    }))
}

/// Return the full game state, including queue depths.
pub async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.game_state().await)
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Register a player. Responds `201 Created` with the player record.
pub async fn create_player(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewPlayer>,
) -> Result<impl IntoResponse, ObserverError> {
    let player = state.engine.add_player(request).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// Return one player's game state.
pub async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let player_id = parse_player_id(&id_str)?;
    let player_state = state
        .engine
        .player_game_state(player_id)
        .await
        .ok_or_else(|| ObserverError::NotFound(format!("player {player_id}")))?;
    Ok(Json(player_state))
}

/// Remove a player. Responds with the removed record.
pub async fn delete_player(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let player_id = parse_player_id(&id_str)?;
    let removed = state
        .engine
        .remove_player(player_id)
        .await
        .ok_or_else(|| ObserverError::NotFound(format!("player {player_id}")))?;
    info!(player_id = %player_id, "Player removed via API");
    Ok(Json(removed))
}

// ---------------------------------------------------------------------------
// POST /api/actions
// ---------------------------------------------------------------------------

/// Queue an action.
///
/// - `202 Accepted` when queued
/// - `422 Unprocessable Entity` for an unknown priority name
/// - `503 Service Unavailable` when the queue is full and the action was
///   shed
pub async fn queue_action(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActionRequest>,
) -> impl IntoResponse {
    let outcome = state.engine.queue_action(request);
    let status = match outcome {
        EnqueueOutcome::Queued { .. } => StatusCode::ACCEPTED,
        EnqueueOutcome::UnknownPriority { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EnqueueOutcome::Shed { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(outcome))
}

// ---------------------------------------------------------------------------
// GET /api/budgets/{tier}
// ---------------------------------------------------------------------------

/// Remaining AI decisions of a tier this quarter. `404` for unknown tiers.
pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    Path(tier): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let tier = tier
        .parse::<AiTier>()
        .map_err(|e| ObserverError::NotFound(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "tier": tier,
        "remaining": state.engine.remaining_ai_budget(tier),
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_player_id(s: &str) -> Result<PlayerId, ObserverError> {
    s.parse::<Uuid>()
        .map(PlayerId::from)
        .map_err(|e| ObserverError::InvalidUuid(format!("{s}: {e}")))
}
