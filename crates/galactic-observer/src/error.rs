//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use galactic_core::EngineError;

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A UUID could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// The request body was well-formed but rejected.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The engine cannot take the request right now.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ObserverError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::InvalidPlayer { .. } | EngineError::UnknownRegion { .. } => {
                Self::BadRequest(message)
            }
            EngineError::DuplicatePlayer { .. } | EngineError::DuplicateCivilization { .. } => {
                Self::Conflict(message)
            }
            EngineError::NotInitialized | EngineError::CapacityReached { .. } => {
                Self::Unavailable(message)
            }
            EngineError::Config { .. }
            | EngineError::Clock { .. }
            | EngineError::Persist { .. }
            | EngineError::AlreadyInitialized
            | EngineError::TaskFailed { .. } => Self::Internal(message),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidUuid(msg) | Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_client_and_server_statuses() {
        let cases = [
            (
                EngineError::InvalidPlayer {
                    reason: "blank".to_owned(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::CapacityReached { limit: 10 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                EngineError::TaskFailed {
                    message: "panicked".to_owned(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ObserverError::from(error).into_response().status(), status);
        }
    }
}
