use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use fanpulse_core::PipelineError;
use fanpulse_sdk::objects::{IngestResponse, RejectedEvent, decode_events};

use super::ApiError;
use crate::state::AppState;

/// `POST /api/v1/events`: submit one event or an array of events.
///
/// Each event is decoded and validated on its own; malformed ones are
/// reported by index in `rejected` and the rest are accepted. Responds
/// `202 Accepted` unless every submitted event was rejected.
pub(super) async fn ingest_events(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if !state.pipeline.is_accepting() {
        return Err(ApiError::ShuttingDown);
    }

    let decoded = match serde_json::from_slice(&body) {
        Ok(value) => decode_events(value),
        Err(e) => vec![Err(e)],
    };

    let mut response = IngestResponse::default();
    for (index, raw) in decoded.into_iter().enumerate() {
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                state.pipeline.metrics().record_malformed();
                tracing::warn!(index, error = %e, "Dropping undecodable event");
                response.rejected.push(RejectedEvent {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match state.pipeline.submit_raw(raw).await {
            Ok(outcome) => {
                response.accepted += 1;
                if outcome.critical {
                    response.critical += 1;
                }
            }
            Err(PipelineError::ShuttingDown) => return Err(ApiError::ShuttingDown),
            Err(e) => response.rejected.push(RejectedEvent {
                index,
                reason: e.to_string(),
            }),
        }
    }

    let status = if response.accepted == 0 && !response.rejected.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(response)))
}
