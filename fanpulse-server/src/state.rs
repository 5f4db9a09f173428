//! Application state shared across all request handlers.

use fanpulse_core::PipelineHandle;
use tokio::sync::watch;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineHandle,
    /// Flips to `true` once the server starts shutting down. Long-lived
    /// WebSocket streams watch it to close with `GOING_AWAY`.
    pub shutdown_rx: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(pipeline: PipelineHandle, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            pipeline,
            shutdown_rx,
        }
    }
}
