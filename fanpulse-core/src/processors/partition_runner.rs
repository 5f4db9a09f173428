//! PartitionRunner processor.
//!
//! The PartitionRunner is responsible for:
//! - Draining its partition's `IngestionBuffer` in FIFO order
//! - Pushing every drained event through the partition topology
//! - Force-flushing the pending batch on every `FlushTick`
//! - Swapping in a reloaded scoring table when the `ConfigStore` changes
//! - Draining the buffer once more and flushing on shutdown
//!
//! One runner owns one topology, so events of a game (routed to a single
//! partition) are applied in dequeue order by a single task.

use std::sync::Arc;
use std::time::Duration;

use fanpulse_sdk::objects::EventType;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::batch::BatchState;
use crate::config::{ConfigStore, ConfigWatcher, PipelineConfig};
use crate::events::{BufferedEvent, FlushTickReceiver};
use crate::ingest::{IngestionBuffer, SequenceCheck, SequenceTracker};
use crate::metrics::PipelineMetrics;
use crate::scoring::ScoringTable;
use crate::sink::SinkDispatcher;
use crate::topology::{SinkTrigger, StageError, Topology, TopologyBuilder};

pub type PartitionTopology = Topology<BufferedEvent, BatchState>;

/// Chain run by every partition:
/// `map(sequence-check) -> filter(ignored-types) -> aggregate(player-state) -> sink(dispatch)`.
pub fn build_topology(
    partition: usize,
    batch: BatchState,
    ignored_types: Vec<EventType>,
    dispatcher: SinkDispatcher,
    metrics: Arc<PipelineMetrics>,
) -> PartitionTopology {
    let mut sequences = SequenceTracker::new();

    TopologyBuilder::<BufferedEvent>::new()
        .map("sequence-check", move |buffered: BufferedEvent| {
            let event = &buffered.event;
            let check = sequences.observe(&event.game_id, event.sequence);
            if let SequenceCheck::Duplicate { sequence } = check {
                metrics.record_duplicate_sequence();
                debug!(
                    partition,
                    event_id = %event.id,
                    game_id = %event.game_id,
                    sequence,
                    "Duplicate sequence, applying anyway"
                );
            } else if check.is_anomaly() {
                metrics.record_out_of_order();
                debug!(
                    partition,
                    event_id = %event.id,
                    game_id = %event.game_id,
                    check = ?check,
                    "Out-of-order event, applying in dequeue order"
                );
            }
            Ok(Some(buffered))
        })
        .filter("ignored-types", move |buffered: &BufferedEvent| {
            !ignored_types.contains(&buffered.event.kind)
        })
        .aggregate(
            "player-state",
            batch,
            |state: &mut BatchState, buffered: BufferedEvent| state.fold(buffered),
        )
        .sink(
            "dispatch",
            move |state: &mut BatchState, trigger: SinkTrigger| -> Result<(), StageError> {
                if let Some(data) = state.take_ready(trigger) {
                    let report = dispatcher.dispatch(Arc::new(data));
                    debug!(
                        partition,
                        trigger = ?trigger,
                        subscribers = report.subscribers,
                        persist_enqueued = report.persist_enqueued,
                        persist_dropped = report.persist_dropped,
                        "Batch emitted"
                    );
                }
                Ok(())
            },
        )
}

pub struct PartitionRunner {
    partition: usize,
    buffer: Arc<IngestionBuffer>,
    topology: PartitionTopology,
    metrics: Arc<PipelineMetrics>,
    drain_max: usize,
    idle_backoff: Duration,
}

impl PartitionRunner {
    pub fn new(
        partition: usize,
        buffer: Arc<IngestionBuffer>,
        topology: PartitionTopology,
        metrics: Arc<PipelineMetrics>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            partition,
            buffer,
            topology,
            metrics,
            drain_max: config.drain_max.max(1),
            idle_backoff: config.idle_backoff,
        }
    }

    /// Run the drain loop until shutdown is signaled.
    pub async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut flush_rx: FlushTickReceiver,
        scoring: ConfigStore<ScoringTable>,
        mut scoring_watcher: ConfigWatcher,
    ) {
        let stages = self
            .topology
            .describe()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        info!(partition = self.partition, stages = %stages, "PartitionRunner started");

        let idle_backoff = self.idle_backoff;
        let mut ticks_open = true;

        while !*shutdown_rx.borrow() {
            let drained = self.drain_once();

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(
                            partition = self.partition,
                            "PartitionRunner received shutdown signal"
                        );
                        break;
                    }
                }

                Ok(version) = scoring_watcher.changed() => {
                    self.topology.state_mut().set_table(scoring.load().await);
                    info!(partition = self.partition, version, "Scoring table reloaded");
                }

                tick = flush_rx.recv(), if ticks_open => {
                    match tick {
                        Ok(_) => self.flush(),
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(partition = self.partition, skipped, "Missed flush ticks");
                            self.flush();
                        }
                        Err(RecvError::Closed) => {
                            warn!(partition = self.partition, "Flush tick channel closed");
                            ticks_open = false;
                        }
                    }
                }

                _ = async {
                    if drained == 0 {
                        tokio::time::sleep(idle_backoff).await;
                    } else {
                        tokio::task::yield_now().await;
                    }
                } => {}
            }
        }

        let mut remaining = 0;
        loop {
            let drained = self.drain_once();
            if drained == 0 {
                break;
            }
            remaining += drained;
        }
        self.flush();

        info!(
            partition = self.partition,
            drained_on_shutdown = remaining,
            "PartitionRunner shutdown complete"
        );
    }

    /// Push up to `drain_max` buffered events through the topology. Returns
    /// how many were dequeued.
    fn drain_once(&mut self) -> usize {
        let batch = self.buffer.drain(self.drain_max);
        let drained = batch.len();
        for buffered in batch {
            let event_id = buffered.event.id.clone();
            if let Err(err) = self.topology.process(buffered) {
                self.metrics.record_stage_error();
                warn!(
                    partition = self.partition,
                    event_id = %event_id,
                    error = %err,
                    "Event dropped by topology"
                );
            }
        }
        drained
    }

    fn flush(&mut self) {
        if let Err(err) = self.topology.flush() {
            self.metrics.record_stage_error();
            warn!(partition = self.partition, error = %err, "Topology flush failed");
        }
    }
}
