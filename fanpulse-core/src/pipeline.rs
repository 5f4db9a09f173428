//! Pipeline assembly and the public submit/shutdown surface.
//!
//! [`Pipeline::builder`] collects the injected parts (configs, scoring table,
//! repository, team index, state store). [`PipelineBuilder::start`] wires the
//! channels, spawns every processor and returns a [`RunningPipeline`], which
//! owns the task handles, and a cloneable [`PipelineHandle`] for producers.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use compact_str::CompactString;
use fanpulse_sdk::objects::{GameEvent, HealthSnapshot, PlayerStateSnapshot, RawEvent};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{
    ConfigError, ConfigStore, CriticalConfig, MomentumConfig, PipelineConfig, WriterConfig,
};
use crate::events::{
    BufferedEvent, NotificationReceiver, flush_tick_channel, notification_channel,
    persist_request_channel,
};
use crate::fast_path::CriticalPath;
use crate::ingest::{IngestionBuffer, MalformedEvent, normalize};
use crate::metrics::PipelineMetrics;
use crate::processors::{
    BatchState, FlushScheduler, MetricsReporter, PartitionRunner, StateWriter, build_topology,
};
use crate::scoring::ScoringTable;
use crate::sink::{
    NoopRepository, PersistError, SinkDispatcher, StateRepository, StaticTeamIndex, TeamIndex,
};
use crate::state::PlayerStateStore;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is shutting down")]
    ShuttingDown,

    #[error("malformed event: {0}")]
    Malformed(#[from] MalformedEvent),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result of a successful submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// The event was also emitted through the critical fast path.
    pub critical: bool,
    /// Id of the oldest buffered event, evicted to make room.
    pub evicted: Option<CompactString>,
}

pub struct Pipeline;

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    momentum: MomentumConfig,
    critical: CriticalConfig,
    writer: WriterConfig,
    scoring: Option<ConfigStore<ScoringTable>>,
    repository: Option<Arc<dyn StateRepository>>,
    team_index: Option<Arc<dyn TeamIndex>>,
    store: Option<Arc<PlayerStateStore>>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Ignored when a store is injected with [`store`](Self::store).
    pub fn momentum(mut self, momentum: MomentumConfig) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn critical(mut self, critical: CriticalConfig) -> Self {
        self.critical = critical;
        self
    }

    pub fn writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }

    pub fn scoring_table(mut self, table: ScoringTable) -> Self {
        self.scoring = Some(ConfigStore::new(table));
        self
    }

    /// Share a reloadable table with the caller (the server swaps it on SIGHUP).
    pub fn scoring_store(mut self, store: ConfigStore<ScoringTable>) -> Self {
        self.scoring = Some(store);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn StateRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn team_index(mut self, team_index: Arc<dyn TeamIndex>) -> Self {
        self.team_index = Some(team_index);
        self
    }

    pub fn store(mut self, store: Arc<PlayerStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate, wire the channels and spawn every processor.
    pub async fn start(self) -> Result<RunningPipeline, PipelineError> {
        let Self {
            config,
            momentum,
            critical,
            writer,
            scoring,
            repository,
            team_index,
            store,
        } = self;

        config.validate()?;
        writer.validate()?;

        let scoring = scoring.unwrap_or_else(|| ConfigStore::new(ScoringTable::default()));
        let repository = repository.unwrap_or_else(|| Arc::new(NoopRepository));
        let team_index = team_index.unwrap_or_else(|| Arc::new(StaticTeamIndex::default()));
        let store = store.unwrap_or_else(|| Arc::new(PlayerStateStore::new(momentum)));
        let metrics = Arc::new(PipelineMetrics::new());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (writer_shutdown_tx, writer_shutdown_rx) = watch::channel(false);
        let (tick_tx, _) = flush_tick_channel();
        let (notify_tx, _) = notification_channel(config.notification_buffer);
        let (persist_tx, persist_rx) = persist_request_channel(writer.queue_capacity);
        let (health_tx, health_rx) = watch::channel(HealthSnapshot::default());

        let dispatcher =
            SinkDispatcher::new(notify_tx, persist_tx, team_index.clone(), metrics.clone());

        // Subscribe before loading so a reload in between is not missed.
        let watchers: Vec<_> = (0..config.partitions).map(|_| scoring.subscribe()).collect();
        let table = scoring.load().await;
        table.validate()?;

        let mut buffers = Vec::with_capacity(config.partitions);
        let mut runners = Vec::with_capacity(config.partitions);
        for (partition, watcher) in watchers.into_iter().enumerate() {
            let buffer = Arc::new(IngestionBuffer::new(config.buffer_capacity));
            let batch = BatchState::new(
                store.clone(),
                table.clone(),
                team_index.clone(),
                metrics.clone(),
                config.batch_size,
            );
            let topology = build_topology(
                partition,
                batch,
                config.ignored_types.clone(),
                dispatcher.clone(),
                metrics.clone(),
            );
            let runner =
                PartitionRunner::new(partition, buffer.clone(), topology, metrics.clone(), &config);
            runners.push(tokio::spawn(runner.run(
                shutdown_rx.clone(),
                tick_tx.subscribe(),
                scoring.clone(),
                watcher,
            )));
            buffers.push(buffer);
        }

        let scheduler = FlushScheduler::new(config.flush_interval, tick_tx);
        let reporter = MetricsReporter::new(
            metrics.clone(),
            buffers.clone(),
            config.metrics_interval,
            health_tx,
        );
        let background = vec![
            tokio::spawn(scheduler.run(shutdown_rx.clone())),
            tokio::spawn(reporter.run(shutdown_rx)),
        ];

        let state_writer = StateWriter::new(
            repository.clone(),
            persist_rx,
            metrics.clone(),
            writer,
            config.shutdown_grace,
        );
        let writer_task = tokio::spawn(state_writer.run(writer_shutdown_rx));

        let fast_path =
            CriticalPath::new(critical, store.clone(), dispatcher.clone(), metrics.clone());

        info!(
            partitions = config.partitions,
            buffer_capacity = config.buffer_capacity,
            batch_size = config.batch_size,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            "Pipeline started"
        );

        Ok(RunningPipeline {
            handle: PipelineHandle {
                inner: Arc::new(HandleInner {
                    accepting: AtomicBool::new(true),
                    in_flight: AtomicUsize::new(0),
                    buffers,
                    fast_path,
                    dispatcher,
                    store,
                    metrics,
                    scoring,
                    repository,
                    health_rx,
                }),
            },
            shutdown_tx,
            writer_shutdown_tx,
            runners,
            background,
            writer: writer_task,
            grace: config.shutdown_grace,
        })
    }
}

struct HandleInner {
    accepting: AtomicBool,
    /// Submits between their accepting check and their buffer push.
    in_flight: AtomicUsize,
    buffers: Vec<Arc<IngestionBuffer>>,
    fast_path: CriticalPath,
    dispatcher: SinkDispatcher,
    store: Arc<PlayerStateStore>,
    metrics: Arc<PipelineMetrics>,
    scoring: ConfigStore<ScoringTable>,
    repository: Arc<dyn StateRepository>,
    health_rx: watch::Receiver<HealthSnapshot>,
}

/// Cheap, cloneable entry point for producers and readers.
#[derive(Clone)]
pub struct PipelineHandle {
    inner: Arc<HandleInner>,
}

impl PipelineHandle {
    /// Accept a validated event.
    ///
    /// Never blocks on the topology: the event is appended to its partition's
    /// buffer (evicting the oldest one when full). Critical events are also
    /// emitted to subscribers before this returns.
    pub async fn submit(&self, event: GameEvent) -> Result<SubmitOutcome, PipelineError> {
        let _in_flight = self.enter()?;
        let inner = &self.inner;
        let buffered = BufferedEvent::new(event);

        let critical = inner.fast_path.is_critical(&buffered.event);
        if critical {
            let table = inner.scoring.load().await;
            inner
                .fast_path
                .emit(&buffered.event, buffered.ingested_at, &table);
        }

        let partition = self.partition_for(&buffered.event.game_id);
        let evicted = inner.buffers[partition].push(buffered).map(|evicted| {
            inner.metrics.record_overflow();
            warn!(
                partition,
                evicted_event_id = %evicted.event.id,
                "Ingestion buffer full, evicted oldest event"
            );
            evicted.event.id
        });

        Ok(SubmitOutcome { critical, evicted })
    }

    /// Normalize a feed message and submit it. Malformed messages are counted
    /// and logged here.
    pub async fn submit_raw(&self, raw: RawEvent) -> Result<SubmitOutcome, PipelineError> {
        if !self.is_accepting() {
            return Err(PipelineError::ShuttingDown);
        }
        let event_id = raw.id.clone();
        match normalize(raw, OffsetDateTime::now_utc()) {
            Ok(event) => self.submit(event).await,
            Err(err) => {
                self.inner.metrics.record_malformed();
                warn!(
                    event_id = event_id.as_deref().unwrap_or("<missing>"),
                    error = %err,
                    "Dropping malformed event"
                );
                Err(err.into())
            }
        }
    }

    /// Register a submit. Shutdown waits for every registered submit to finish
    /// its push before signaling the runners, so no push lands after the
    /// final drain.
    fn enter(&self) -> Result<InFlight<'_>, PipelineError> {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(&self.inner.in_flight);
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(PipelineError::ShuttingDown);
        }
        Ok(guard)
    }

    /// Wait until no submit is between its check and its push.
    async fn settle_submits(&self, deadline: tokio::time::Instant) {
        while self.inner.in_flight.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!("Submits still in flight after grace, continuing shutdown");
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    fn partition_for(&self, game_id: &str) -> usize {
        let partitions = self.inner.buffers.len();
        if partitions <= 1 {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        game_id.hash(&mut hasher);
        (hasher.finish() % partitions as u64) as usize
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        self.inner.dispatcher.subscribe()
    }

    /// Latest snapshot published by the metrics reporter.
    pub fn health(&self) -> HealthSnapshot {
        self.inner.health_rx.borrow().clone()
    }

    pub fn health_watch(&self) -> watch::Receiver<HealthSnapshot> {
        self.inner.health_rx.clone()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.inner.metrics
    }

    pub fn store(&self) -> &Arc<PlayerStateStore> {
        &self.inner.store
    }

    pub fn scoring(&self) -> &ConfigStore<ScoringTable> {
        &self.inner.scoring
    }

    pub fn repository(&self) -> &Arc<dyn StateRepository> {
        &self.inner.repository
    }

    /// Player state from memory, falling back to the persisted snapshot.
    pub async fn player_state(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerStateSnapshot>, PersistError> {
        if let Some(snapshot) = self.inner.store.peek(player_id) {
            return Ok(Some(snapshot));
        }
        self.inner.repository.fetch(player_id).await
    }

    /// Events currently buffered across all partitions.
    pub fn buffer_depth(&self) -> usize {
        self.inner.buffers.iter().map(|buffer| buffer.len()).sum()
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A started pipeline.
///
/// Dropping it without calling [`shutdown`](Self::shutdown) closes the
/// shutdown channels, so every task winds down on its own: runners still
/// drain and flush, the writer still drains its queue. Nothing waits for
/// them, no grace period applies, and handles keep accepting events that
/// no runner will drain.
pub struct RunningPipeline {
    handle: PipelineHandle,
    shutdown_tx: watch::Sender<bool>,
    writer_shutdown_tx: watch::Sender<bool>,
    runners: Vec<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
    writer: JoinHandle<()>,
    grace: Duration,
}

impl RunningPipeline {
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Drain-and-stop with the configured grace period.
    pub async fn shutdown(self) {
        let grace = self.grace;
        self.shutdown_with_grace(grace).await;
    }

    /// Stop accepting, let every runner drain its buffer and flush, then let
    /// the writer drain its queue. Tasks still running once `grace` has
    /// elapsed for their phase are aborted.
    pub async fn shutdown_with_grace(self, grace: Duration) {
        info!(grace_ms = grace.as_millis() as u64, "Pipeline shutting down");
        self.handle.inner.accepting.store(false, Ordering::SeqCst);

        let deadline = tokio::time::Instant::now() + grace;
        self.handle.settle_submits(deadline).await;
        let _ = self.shutdown_tx.send(true);

        for task in self.runners.into_iter().chain(self.background) {
            join_until(task, deadline).await;
        }

        let stranded = self.handle.buffer_depth();
        if stranded > 0 {
            warn!(stranded, "Events left in buffers after runners stopped");
        }

        let _ = self.writer_shutdown_tx.send(true);
        join_until(self.writer, tokio::time::Instant::now() + grace).await;

        info!("Pipeline shutdown complete");
    }
}

async fn join_until(mut task: JoinHandle<()>, deadline: tokio::time::Instant) {
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "Pipeline task failed"),
        Err(_) => {
            warn!("Pipeline task did not stop within grace, aborting");
            task.abort();
        }
    }
    debug!("Pipeline task joined");
}
