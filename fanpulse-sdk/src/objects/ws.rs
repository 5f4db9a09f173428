//! WebSocket message types for the team update stream.
//!
//! The `GET /api/v1/teams/{team_id}/ws` endpoint upgrades to a WebSocket
//! connection and pushes [`WsServerMessage`] JSON frames.
//!
//! # Protocol
//!
//! 1. The server sends a [`WsServerMessage::Update`] for every
//!    [`ProcessedData`] whose affected teams include the subscribed team.
//! 2. If the subscriber falls behind, updates are skipped and a
//!    [`WsServerMessage::Lagged`] frame reports how many. Delivery is
//!    at-most-once.
//! 3. When the pipeline shuts down the server sends a close frame with
//!    [`WsCloseCode::GOING_AWAY`].

use serde::{Deserialize, Serialize};

use super::processed::ProcessedData;

/// Server-to-client WebSocket message.
///
/// ```json
/// {"type":"update","data":{ ... }}
/// {"type":"lagged","skipped":12}
/// {"type":"error","code":1011,"reason":"internal error"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// A processed update affecting the subscribed team.
    Update { data: ProcessedData },

    /// The subscriber was too slow and missed `skipped` updates.
    Lagged { skipped: u64 },

    /// A server-side error. The server may send a close frame afterwards.
    Error { code: u16, reason: String },
}

/// Well-known WebSocket close codes used by the team update stream.
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;

    /// The server is shutting down.
    pub const GOING_AWAY: u16 = 1001;

    /// An unexpected server-side error prevented the stream from continuing.
    pub const INTERNAL_ERROR: u16 = 1011;
}
