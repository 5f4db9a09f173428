//! Critical-event fast path.
//!
//! Score, injury and touchdown-equivalent events are emitted to subscribers
//! on the arrival path instead of waiting for the next batch flush. The
//! emitted record is a projection: the event applied to a copy of the
//! current state. The authoritative apply still happens when the event is
//! folded by its partition's topology, so the store keeps a single writer
//! per game.

use std::sync::Arc;
use std::time::Instant;

use fanpulse_sdk::objects::{FantasyImpact, GameEvent, ProcessedData, Trigger};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::CriticalConfig;
use crate::metrics::PipelineMetrics;
use crate::scoring::ScoringTable;
use crate::sink::{SinkDispatcher, record_impact};
use crate::state::PlayerStateStore;

pub struct CriticalPath {
    config: CriticalConfig,
    store: Arc<PlayerStateStore>,
    dispatcher: SinkDispatcher,
    metrics: Arc<PipelineMetrics>,
}

impl CriticalPath {
    pub fn new(
        config: CriticalConfig,
        store: Arc<PlayerStateStore>,
        dispatcher: SinkDispatcher,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            metrics,
        }
    }

    pub fn is_critical(&self, event: &GameEvent) -> bool {
        self.config.types.contains(&event.kind)
            || self
                .config
                .touchdown_stats
                .iter()
                .any(|stat| event.stat(*stat) > 0.0)
    }

    /// Build and broadcast the projected update for a critical event.
    ///
    /// Latency is measured from `ingested_at`. A record over the latency
    /// target is still emitted; only the breach counter moves.
    pub fn emit(
        &self,
        event: &GameEvent,
        ingested_at: Instant,
        table: &ScoringTable,
    ) -> Arc<ProcessedData> {
        let outcome = self.store.project(event, table, OffsetDateTime::now_utc());

        let mut fantasy_impact = FantasyImpact::default();
        record_impact(
            &mut fantasy_impact,
            event,
            outcome.fantasy_delta,
            self.dispatcher.team_index().as_ref(),
        );

        let latency = ingested_at.elapsed();
        let data = Arc::new(ProcessedData {
            trigger: Trigger::Event {
                event: event.clone(),
            },
            player_updates: outcome.player.into_iter().collect(),
            fantasy_impact,
            processing_latency_ms: latency.as_secs_f64() * 1000.0,
            critical: true,
        });

        self.metrics.record_critical();
        if latency > self.config.latency_target {
            self.metrics.record_latency_breach();
            warn!(
                event_id = %event.id,
                latency_ms = data.processing_latency_ms,
                target_ms = self.config.latency_target.as_secs_f64() * 1000.0,
                "Critical event exceeded latency target"
            );
        }

        let subscribers = self.dispatcher.broadcast(Arc::clone(&data));
        debug!(event_id = %event.id, kind = %event.kind, subscribers, "Critical event emitted");
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MomentumConfig;
    use crate::events::{NotificationReceiver, notification_channel, persist_request_channel};
    use crate::sink::StaticTeamIndex;
    use crate::test_support::{EventExt, event, rushing_play};
    use fanpulse_sdk::objects::{EventType, Stat};
    use std::time::Duration;

    struct Fixture {
        path: CriticalPath,
        store: Arc<PlayerStateStore>,
        metrics: Arc<PipelineMetrics>,
        notify_rx: NotificationReceiver,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(PlayerStateStore::new(MomentumConfig::default()));
        let metrics = Arc::new(PipelineMetrics::new());
        let (notify_tx, notify_rx) = notification_channel(16);
        let (persist_tx, _) = persist_request_channel(16);
        let dispatcher = SinkDispatcher::new(
            notify_tx,
            persist_tx,
            Arc::new(StaticTeamIndex::default()),
            metrics.clone(),
        );
        Fixture {
            path: CriticalPath::new(
                CriticalConfig::default(),
                store.clone(),
                dispatcher,
                metrics.clone(),
            ),
            store,
            metrics,
            notify_rx,
        }
    }

    #[test]
    fn classifies_by_type_and_touchdowns() {
        let f = fixture();
        assert!(f.path.is_critical(&event("e1", EventType::Score, "t1", Some("p1"))));
        assert!(f.path.is_critical(&event("e2", EventType::Injury, "t1", Some("p1"))));
        assert!(!f.path.is_critical(&rushing_play("e3", "p1", 12.0)));
        assert!(f.path.is_critical(
            &rushing_play("e4", "p1", 3.0).with_stat(Stat::RushingTouchdowns, 1.0)
        ));
        assert!(!f.path.is_critical(&event("e5", EventType::Timeout, "t1", None)));
    }

    #[test]
    fn emits_projection_without_touching_store() {
        let mut f = fixture();
        let e = event("e1", EventType::Score, "t1", Some("p1")).with_stat(Stat::Points, 6.0);

        let data = f.path.emit(&e, Instant::now(), &ScoringTable::default());

        assert!(data.critical);
        assert_eq!(data.player_updates.len(), 1);
        assert_eq!(data.player_updates[0].fantasy_points, 6.0);
        assert_eq!(data.fantasy_impact.point_changes.get("p1"), Some(&6.0));
        assert!(data.affects_team("t1"));
        assert!(f.store.peek("p1").is_none());

        let received = f.notify_rx.try_recv().unwrap();
        assert!(Arc::ptr_eq(&received, &data));
        assert_eq!(f.metrics.totals().critical_events, 1);
        assert_eq!(f.metrics.totals().latency_breaches, 0);
    }

    #[test]
    fn breach_counted_only_over_target() {
        let f = fixture();
        let e = event("e1", EventType::Injury, "t1", Some("p1"));

        let late = Instant::now()
            .checked_sub(Duration::from_millis(50))
            .unwrap();
        let data = f.path.emit(&e, late, &ScoringTable::default());
        assert!(data.processing_latency_ms >= 50.0);
        assert_eq!(f.metrics.totals().latency_breaches, 1);

        f.path.emit(&e, Instant::now(), &ScoringTable::default());
        assert_eq!(f.metrics.totals().latency_breaches, 1);
        assert_eq!(f.metrics.totals().critical_events, 2);
    }
}
