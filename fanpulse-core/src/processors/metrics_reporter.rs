//! MetricsReporter processor.
//!
//! Every `metrics_interval` the reporter sums the depth of all ingestion
//! buffers, takes a [`HealthSnapshot`] (which resets the interval counters),
//! logs it and publishes it on a `watch` channel for `GET /metrics`.

use std::sync::Arc;
use std::time::Duration;

use fanpulse_sdk::objects::HealthSnapshot;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{info, warn};

use crate::ingest::IngestionBuffer;
use crate::metrics::PipelineMetrics;

pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    buffers: Vec<Arc<IngestionBuffer>>,
    interval: Duration,
    health_tx: watch::Sender<HealthSnapshot>,
}

impl MetricsReporter {
    pub fn new(
        metrics: Arc<PipelineMetrics>,
        buffers: Vec<Arc<IngestionBuffer>>,
        interval: Duration,
        health_tx: watch::Sender<HealthSnapshot>,
    ) -> Self {
        Self {
            metrics,
            buffers,
            interval,
            health_tx,
        }
    }

    /// Run the MetricsReporter until shutdown is signaled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_report = Instant::now();

        info!("MetricsReporter started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("MetricsReporter received shutdown signal");
                        break;
                    }
                }

                now = ticker.tick() => {
                    self.report(now.duration_since(last_report));
                    last_report = now;
                }
            }
        }

        info!("MetricsReporter shutdown complete");
    }

    fn report(&self, elapsed: Duration) -> HealthSnapshot {
        let buffer_depth = self.buffers.iter().map(|buffer| buffer.len()).sum();
        let snapshot = self.metrics.take_snapshot(elapsed, buffer_depth);

        info!(
            events_per_sec = snapshot.events_per_sec,
            avg_latency_ms = snapshot.avg_latency_ms,
            error_count = snapshot.error_count,
            buffer_depth = snapshot.buffer_depth,
            processed_total = snapshot.totals.processed,
            "Pipeline health"
        );
        if snapshot.totals.persist_failures > 0 || snapshot.totals.latency_breaches > 0 {
            warn!(
                persist_failures = snapshot.totals.persist_failures,
                latency_breaches = snapshot.totals.latency_breaches,
                "Pipeline degraded"
            );
        }

        self.health_tx.send_replace(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BufferedEvent;
    use crate::test_support::rushing_play;

    #[tokio::test(start_paused = true)]
    async fn publishes_snapshot_and_resets_interval() {
        let metrics = Arc::new(PipelineMetrics::new());
        let buffer = Arc::new(IngestionBuffer::new(8));
        buffer.push(BufferedEvent::new(rushing_play("e1", "p1", 1.0)));
        metrics.record_processed(Duration::from_millis(4));
        metrics.record_processed(Duration::from_millis(2));
        metrics.record_malformed();

        let (health_tx, mut health_rx) = watch::channel(HealthSnapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reporter =
            MetricsReporter::new(metrics.clone(), vec![buffer], Duration::from_secs(1), health_tx);
        let handle = tokio::spawn(reporter.run(shutdown_rx));

        health_rx.changed().await.unwrap();
        let snapshot = health_rx.borrow_and_update().clone();
        assert!((snapshot.events_per_sec - 2.0).abs() < 1e-9);
        assert!((snapshot.avg_latency_ms - 3.0).abs() < 1e-9);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.buffer_depth, 1);
        assert_eq!(snapshot.totals.processed, 2);

        health_rx.changed().await.unwrap();
        let snapshot = health_rx.borrow_and_update().clone();
        assert_eq!(snapshot.events_per_sec, 0.0);
        assert_eq!(snapshot.error_count, 0);
        assert_eq!(snapshot.totals.processed, 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
