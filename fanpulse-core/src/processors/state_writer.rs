//! StateWriter processor.
//!
//! The StateWriter is responsible for:
//! - Receiving `PersistRequest` from its bounded queue
//! - Coalescing queued snapshots by player (latest snapshot wins)
//! - Writing through a `StateRepository` with exponential backoff plus jitter
//! - Logging and counting writes that exhaust their attempts
//! - Draining the queue on shutdown, bounded by the shutdown grace
//!
//! Failed writes never roll back in-memory state; the next snapshot of the
//! same player overwrites whatever the store holds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use compact_str::CompactString;
use fanpulse_sdk::objects::PlayerStateSnapshot;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::WriterConfig;
use crate::events::PersistRequestReceiver;
use crate::metrics::PipelineMetrics;
use crate::sink::StateRepository;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`,
/// capped at `max`.
pub fn calculate_retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}

/// Add up to 50% random jitter, still capped at `max`.
fn with_jitter(delay: Duration, max: Duration) -> Duration {
    let half = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX);
    if half == 0 {
        return delay.min(max);
    }
    let jitter = rand::rng().random_range(0..=half);
    delay.saturating_add(Duration::from_millis(jitter)).min(max)
}

/// Snapshots keyed by player, kept in first-appearance order.
#[derive(Debug, Default)]
struct Coalesced {
    snapshots: Vec<PlayerStateSnapshot>,
    positions: HashMap<CompactString, usize>,
}

impl Coalesced {
    fn push(&mut self, snapshot: PlayerStateSnapshot) {
        match self.positions.get(&snapshot.player_id) {
            Some(&position) => self.snapshots[position] = snapshot,
            None => {
                self.positions
                    .insert(snapshot.player_id.clone(), self.snapshots.len());
                self.snapshots.push(snapshot);
            }
        }
    }

    fn len(&self) -> usize {
        self.snapshots.len()
    }

    fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn into_vec(self) -> Vec<PlayerStateSnapshot> {
        self.snapshots
    }
}

/// Resolves once `true` is published or the sender is gone.
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await.map(|_| ());
}

pub struct StateWriter {
    repository: Arc<dyn StateRepository>,
    persist_rx: PersistRequestReceiver,
    metrics: Arc<PipelineMetrics>,
    config: WriterConfig,
    grace: Duration,
}

impl StateWriter {
    pub fn new(
        repository: Arc<dyn StateRepository>,
        persist_rx: PersistRequestReceiver,
        metrics: Arc<PipelineMetrics>,
        config: WriterConfig,
        grace: Duration,
    ) -> Self {
        Self {
            repository,
            persist_rx,
            metrics,
            config,
            grace,
        }
    }

    /// Run the StateWriter until shutdown is signaled, then drain.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("StateWriter started");
        let mut carried = Vec::new();

        loop {
            tokio::select! {
                biased;

                _ = stop_requested(&mut shutdown_rx) => {
                    info!("StateWriter received shutdown signal");
                    break;
                }

                request = self.persist_rx.recv() => {
                    let Some(request) = request else {
                        info!("PersistRequest channel closed");
                        break;
                    };
                    let mut round = Coalesced::default();
                    round.push(request.snapshot);
                    while round.len() < self.config.coalesce_max {
                        match self.persist_rx.try_recv() {
                            Ok(request) => round.push(request.snapshot),
                            Err(_) => break,
                        }
                    }
                    debug!(snapshots = round.len(), "Writing coalesced round");

                    carried = self.write_round(round.into_vec(), &mut shutdown_rx).await;
                    if !carried.is_empty() {
                        info!("StateWriter interrupted by shutdown signal");
                        break;
                    }
                }
            }
        }

        self.drain(carried).await;
        info!("StateWriter shutdown complete");
    }

    /// Write a round in order. If shutdown arrives mid-round, the snapshots
    /// not yet written (including the one in flight) are returned.
    async fn write_round(
        &self,
        round: Vec<PlayerStateSnapshot>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Vec<PlayerStateSnapshot> {
        let mut remaining = round.into_iter();
        while let Some(snapshot) = remaining.next() {
            let interrupted = tokio::select! {
                biased;
                _ = stop_requested(shutdown_rx) => true,
                _ = self.write_with_retry(&snapshot) => false,
            };
            if interrupted {
                let mut left = vec![snapshot];
                left.extend(remaining);
                return left;
            }
        }
        Vec::new()
    }

    /// Flush whatever is queued, giving up after the grace period.
    async fn drain(&mut self, carried: Vec<PlayerStateSnapshot>) {
        self.persist_rx.close();

        let mut pending = Coalesced::default();
        for snapshot in carried {
            pending.push(snapshot);
        }
        while let Some(request) = self.persist_rx.recv().await {
            pending.push(request.snapshot);
        }
        if pending.is_empty() {
            return;
        }

        let total = pending.len();
        info!(snapshots = total, "Draining state writer queue");
        let writes = async {
            for snapshot in pending.into_vec() {
                self.write_with_retry(&snapshot).await;
            }
        };
        if tokio::time::timeout(self.grace, writes).await.is_err() {
            warn!(
                snapshots = total,
                grace_ms = self.grace.as_millis() as u64,
                "Shutdown grace elapsed, abandoning remaining writes"
            );
        }
    }

    /// Returns whether the snapshot was written.
    async fn write_with_retry(&self, snapshot: &PlayerStateSnapshot) -> bool {
        let mut attempt = 1;
        loop {
            match self.repository.upsert(snapshot).await {
                Ok(()) => {
                    debug!(player_id = %snapshot.player_id, attempt, "Snapshot persisted");
                    return true;
                }
                Err(e) if attempt >= self.config.max_attempts => {
                    error!(
                        player_id = %snapshot.player_id,
                        attempts = attempt,
                        error = %e,
                        "Giving up on snapshot write"
                    );
                    self.metrics.record_persist_failure();
                    return false;
                }
                Err(e) => {
                    let delay = with_jitter(
                        calculate_retry_delay(
                            attempt,
                            self.config.base_backoff,
                            self.config.max_backoff,
                        ),
                        self.config.max_backoff,
                    );
                    warn!(
                        player_id = %snapshot.player_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Snapshot write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{PersistRequest, persist_request_channel};
    use crate::sink::PersistError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use time::OffsetDateTime;

    #[derive(Default)]
    struct FlakyRepository {
        failures_left: AtomicU32,
        written: Mutex<Vec<PlayerStateSnapshot>>,
    }

    impl FlakyRepository {
        fn failing(times: u32) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicU32::new(times),
                written: Mutex::default(),
            })
        }

        fn written(&self) -> Vec<(String, f64)> {
            self.written
                .lock()
                .unwrap()
                .iter()
                .map(|s| (s.player_id.to_string(), s.fantasy_points))
                .collect()
        }
    }

    #[async_trait]
    impl StateRepository for FlakyRepository {
        async fn upsert(&self, snapshot: &PlayerStateSnapshot) -> Result<(), PersistError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(PersistError::Unavailable("connection refused".into()));
            }
            self.written.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        async fn fetch(
            &self,
            _player_id: &str,
        ) -> Result<Option<PlayerStateSnapshot>, PersistError> {
            Ok(None)
        }
    }

    fn snapshot(player_id: &str, fantasy_points: f64) -> PlayerStateSnapshot {
        PlayerStateSnapshot {
            player_id: player_id.into(),
            game_stats: Default::default(),
            fantasy_points,
            momentum: 0.0,
            fatigue: 0.0,
            last_update: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn config(max_attempts: u32) -> WriterConfig {
        WriterConfig {
            max_attempts,
            ..WriterConfig::default()
        }
    }

    #[test]
    fn retry_delay_doubles_up_to_cap() {
        let base = Duration::from_millis(50);
        let max = Duration::from_secs(5);
        assert_eq!(calculate_retry_delay(1, base, max), Duration::from_millis(50));
        assert_eq!(calculate_retry_delay(2, base, max), Duration::from_millis(100));
        assert_eq!(calculate_retry_delay(4, base, max), Duration::from_millis(400));
        assert_eq!(calculate_retry_delay(8, base, max), max);
        assert_eq!(calculate_retry_delay(100, base, max), max);
    }

    #[test]
    fn jitter_stays_within_half_and_cap() {
        let max = Duration::from_secs(5);
        for _ in 0..100 {
            let delay = with_jitter(Duration::from_millis(100), max);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
        assert_eq!(with_jitter(max, max), max);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_write_succeeds() {
        let repository = FlakyRepository::failing(2);
        let metrics = Arc::new(PipelineMetrics::new());
        let (_persist_tx, persist_rx) = persist_request_channel(8);
        let writer = StateWriter::new(
            repository.clone(),
            persist_rx,
            metrics.clone(),
            config(5),
            Duration::from_secs(5),
        );

        assert!(writer.write_with_retry(&snapshot("p1", 3.0)).await);
        assert_eq!(repository.written(), [("p1".to_string(), 3.0)]);
        assert_eq!(metrics.totals().persist_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_counted_not_thrown() {
        let repository = FlakyRepository::failing(u32::MAX);
        let metrics = Arc::new(PipelineMetrics::new());
        let (_persist_tx, persist_rx) = persist_request_channel(8);
        let writer = StateWriter::new(
            repository.clone(),
            persist_rx,
            metrics.clone(),
            config(3),
            Duration::from_secs(5),
        );

        assert!(!writer.write_with_retry(&snapshot("p1", 3.0)).await);
        assert!(repository.written().is_empty());
        assert_eq!(repository.failures_left.load(Ordering::SeqCst), u32::MAX - 3);
        assert_eq!(metrics.totals().persist_failures, 1);
        assert_eq!(metrics.totals().errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn coalesces_queued_snapshots_latest_wins() {
        let repository = FlakyRepository::failing(0);
        let metrics = Arc::new(PipelineMetrics::new());
        let (persist_tx, persist_rx) = persist_request_channel(8);
        for s in [snapshot("p1", 1.0), snapshot("p2", 5.0), snapshot("p1", 3.0)] {
            persist_tx.try_send(PersistRequest { snapshot: s }).unwrap();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let writer = StateWriter::new(
            repository.clone(),
            persist_rx,
            metrics,
            config(5),
            Duration::from_secs(5),
        );
        let handle = tokio::spawn(writer.run(shutdown_rx));

        while repository.written().len() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(
            repository.written(),
            [("p1".to_string(), 3.0), ("p2".to_string(), 5.0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_queue() {
        let repository = FlakyRepository::failing(0);
        let (persist_tx, persist_rx) = persist_request_channel(8);
        persist_tx
            .try_send(PersistRequest {
                snapshot: snapshot("p9", 2.0),
            })
            .unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(true);
        let writer = StateWriter::new(
            repository.clone(),
            persist_rx,
            Arc::new(PipelineMetrics::new()),
            config(5),
            Duration::from_secs(5),
        );
        writer.run(shutdown_rx).await;

        assert_eq!(repository.written(), [("p9".to_string(), 2.0)]);
        assert!(persist_tx.try_send(PersistRequest { snapshot: snapshot("p9", 4.0) }).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn abandons_writes_after_grace() {
        let repository = FlakyRepository::failing(u32::MAX);
        let metrics = Arc::new(PipelineMetrics::new());
        let (persist_tx, persist_rx) = persist_request_channel(8);
        persist_tx
            .try_send(PersistRequest {
                snapshot: snapshot("p1", 1.0),
            })
            .unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(true);
        let writer = StateWriter::new(
            repository.clone(),
            persist_rx,
            metrics.clone(),
            WriterConfig {
                max_attempts: 10,
                base_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(1),
                ..WriterConfig::default()
            },
            Duration::from_millis(500),
        );
        writer.run(shutdown_rx).await;

        assert!(repository.written().is_empty());
        // Abandoned, not exhausted.
        assert_eq!(metrics.totals().persist_failures, 0);
    }
}
