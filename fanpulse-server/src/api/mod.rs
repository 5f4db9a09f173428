//! Public API handlers.
//!
//! # Endpoints
//!
//! - `POST /api/v1/events`              – submit one event or an array of events
//! - `GET  /api/v1/players/{player_id}` – current player state
//! - `GET  /api/v1/teams/{team_id}`     – current team state
//! - `GET  /api/v1/teams/{team_id}/ws`  – WebSocket stream of processed updates

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use fanpulse_core::sink::PersistError;

use crate::state::AppState;

mod events;
mod query;
mod ws;

/// Build the public API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(events::ingest_events))
        .route("/players/{player_id}", get(query::get_player))
        .route("/teams/{team_id}", get(query::get_team))
        .route("/teams/{team_id}/ws", get(ws::team_updates_ws))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
enum ApiError {
    /// The pipeline no longer accepts events.
    ShuttingDown,
    /// Reading persisted state failed.
    Persistence(PersistError),
    /// No state for the requested player or team.
    NotFound(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::ShuttingDown => {
                (StatusCode::SERVICE_UNAVAILABLE, "pipeline is shutting down").into_response()
            }
            ApiError::Persistence(e) => {
                tracing::error!(error = %e, "API persistence error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{what} not found")).into_response()
            }
        }
    }
}
