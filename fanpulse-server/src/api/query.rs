use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use super::ApiError;
use crate::state::AppState;

/// `GET /api/v1/players/{player_id}`: current player state.
///
/// Served from memory; a player not seen since startup falls back to the
/// last persisted snapshot.
pub(super) async fn get_player(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .pipeline
        .player_state(&player_id)
        .await
        .map_err(ApiError::Persistence)?
        .ok_or(ApiError::NotFound("player"))?;

    Ok(Json(snapshot))
}

/// `GET /api/v1/teams/{team_id}`: current team state.
pub(super) async fn get_team(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .pipeline
        .store()
        .team(&team_id)
        .ok_or(ApiError::NotFound("team"))?;

    Ok(Json(snapshot))
}
