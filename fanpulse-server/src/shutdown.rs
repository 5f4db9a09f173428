//! Signal handling for graceful shutdown and scoring table reload.

use std::sync::Arc;

use fanpulse_core::config::ConfigStore;
use fanpulse_core::scoring::ScoringTable;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

use crate::config::ConfigLoader;

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let sigterm = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    let sigint = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = sigterm => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Spawns a task that listens for SIGHUP and reloads the scoring table.
///
/// Partition runners watch the store and pick the new table up on their
/// next iteration. A table that fails to load or validate is logged and the
/// current one stays in place.
///
/// Returns a Notify that can be used to signal when shutdown is complete.
pub fn spawn_config_reload_handler(
    config_loader: Arc<ConfigLoader>,
    scoring: ConfigStore<ScoringTable>,
) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler, reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading scoring table");
                    match config_loader.reload_scoring() {
                        Ok(table) => {
                            let version = scoring.replace(table).await;
                            tracing::info!(version, "Scoring table reloaded successfully");
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload scoring table: {}", e);
                        }
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
