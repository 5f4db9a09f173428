//! Stream-driven feed consumption.
//!
//! Any `Stream<Item = RawEvent>` can feed the pipeline: the server's
//! WebSocket upstream, a replay file, or a test vector.

use fanpulse_sdk::objects::RawEvent;
use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::pipeline::{PipelineError, PipelineHandle};

/// Counts for one [`FeedConsumer::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accepted: u64,
    pub critical: u64,
    pub rejected: u64,
}

pub struct FeedConsumer {
    handle: PipelineHandle,
}

impl FeedConsumer {
    pub fn new(handle: PipelineHandle) -> Self {
        Self { handle }
    }

    /// Submit every message of `stream` until it ends, shutdown is signaled,
    /// or the pipeline stops accepting.
    pub async fn run<S>(&self, stream: S, mut shutdown_rx: watch::Receiver<bool>) -> FeedStats
    where
        S: Stream<Item = RawEvent>,
    {
        tokio::pin!(stream);
        let mut stats = FeedStats::default();

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("FeedConsumer received shutdown signal");
                        break;
                    }
                }

                next = stream.next() => {
                    let Some(raw) = next else {
                        info!("Feed stream ended");
                        break;
                    };
                    match self.handle.submit_raw(raw).await {
                        Ok(outcome) => {
                            stats.accepted += 1;
                            if outcome.critical {
                                stats.critical += 1;
                            }
                        }
                        Err(PipelineError::ShuttingDown) => {
                            info!("Pipeline stopped accepting, FeedConsumer exiting");
                            break;
                        }
                        // Already counted and logged by the pipeline.
                        Err(err) => {
                            debug!(error = %err, "Feed message rejected");
                            stats.rejected += 1;
                        }
                    }
                }
            }
        }

        info!(
            accepted = stats.accepted,
            critical = stats.critical,
            rejected = stats.rejected,
            "FeedConsumer finished"
        );
        stats
    }
}
