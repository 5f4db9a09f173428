use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use fanpulse_sdk::objects::ws::{WsCloseCode, WsServerMessage};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// `GET /api/v1/teams/{team_id}/ws`: WebSocket stream of processed updates.
///
/// Pushes a [`WsServerMessage::Update`] for every processed record whose
/// affected teams include `team_id`. Delivery is at-most-once: a slow
/// client gets a [`WsServerMessage::Lagged`] frame and skips ahead.
pub(super) async fn team_updates_ws(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_team_ws(socket, state, team_id))
}

/// Background task that drives a single WebSocket connection.
async fn handle_team_ws(mut socket: WebSocket, state: AppState, team_id: String) {
    let mut updates = state.pipeline.subscribe();
    let mut shutdown_rx = state.shutdown_rx.clone();
    if *shutdown_rx.borrow_and_update() {
        close(&mut socket, WsCloseCode::GOING_AWAY, "server shutting down").await;
        return;
    }
    tracing::debug!(%team_id, "WS: team subscriber connected");

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    close(&mut socket, WsCloseCode::GOING_AWAY, "server shutting down").await;
                    return;
                }
            }

            result = updates.recv() => {
                match result {
                    Ok(data) if data.affects_team(&team_id) => {
                        let msg = WsServerMessage::Update {
                            data: (*data).clone(),
                        };
                        if send_json(&mut socket, &msg).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%team_id, skipped, "WS: subscriber lagged, skipping ahead");
                        if send_json(&mut socket, &WsServerMessage::Lagged { skipped })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(RecvError::Closed) => {
                        close(&mut socket, WsCloseCode::GOING_AWAY, "pipeline stopped").await;
                        return;
                    }
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        tracing::debug!(%team_id, "WS: team subscriber disconnected");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
