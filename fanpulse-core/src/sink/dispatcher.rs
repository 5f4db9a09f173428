//! Fan-out of processed updates.
//!
//! Two independent, non-blocking side effects per record: a broadcast to
//! subscribers and one persist request per updated player onto the state
//! writer's bounded queue. Neither waits on the other and neither can fail
//! the caller.

use std::sync::Arc;

use fanpulse_sdk::objects::ProcessedData;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::team_index::TeamIndex;
use crate::events::{NotificationReceiver, NotificationSender, PersistRequest, PersistRequestSender};
use crate::metrics::PipelineMetrics;

#[derive(Clone)]
pub struct SinkDispatcher {
    notify_tx: NotificationSender,
    persist_tx: PersistRequestSender,
    team_index: Arc<dyn TeamIndex>,
    metrics: Arc<PipelineMetrics>,
}

/// What a dispatch did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers the record reached (zero when nobody listens).
    pub subscribers: usize,
    pub persist_enqueued: usize,
    pub persist_dropped: usize,
}

impl SinkDispatcher {
    pub fn new(
        notify_tx: NotificationSender,
        persist_tx: PersistRequestSender,
        team_index: Arc<dyn TeamIndex>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            notify_tx,
            persist_tx,
            team_index,
            metrics,
        }
    }

    pub fn team_index(&self) -> &Arc<dyn TeamIndex> {
        &self.team_index
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        self.notify_tx.subscribe()
    }

    /// Broadcast only. Used for projections that must not be persisted.
    pub fn broadcast(&self, data: Arc<ProcessedData>) -> usize {
        match self.notify_tx.send(data) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No subscribers for processed update");
                0
            }
        }
    }

    /// Broadcast and queue a write for every player snapshot in the record.
    pub fn dispatch(&self, data: Arc<ProcessedData>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for snapshot in &data.player_updates {
            let request = PersistRequest {
                snapshot: snapshot.clone(),
            };
            match self.persist_tx.try_send(request) {
                Ok(()) => report.persist_enqueued += 1,
                Err(TrySendError::Full(request)) => {
                    report.persist_dropped += 1;
                    self.metrics.record_persist_dropped();
                    warn!(
                        player_id = %request.snapshot.player_id,
                        "State writer queue full, dropping snapshot"
                    );
                }
                Err(TrySendError::Closed(request)) => {
                    report.persist_dropped += 1;
                    self.metrics.record_persist_dropped();
                    debug!(
                        player_id = %request.snapshot.player_id,
                        "State writer stopped, dropping snapshot"
                    );
                }
            }
        }

        report.subscribers = self.broadcast(data);
        report
    }
}
