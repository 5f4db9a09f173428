//! Aggregate state of a partition topology.
//!
//! Folding applies each event to the shared [`PlayerStateStore`] and records
//! what the pending batch touched. The sink turns the pending batch into one
//! [`ProcessedData`] when it is full or when a flush tick arrives.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use compact_str::CompactString;
use fanpulse_sdk::objects::{FantasyImpact, ProcessedData, Trigger};
use uuid::Uuid;

use crate::events::BufferedEvent;
use crate::metrics::PipelineMetrics;
use crate::scoring::ScoringTable;
use crate::sink::{TeamIndex, record_impact};
use crate::state::PlayerStateStore;
use crate::topology::{SinkTrigger, StageError};

#[derive(Debug, Default)]
struct PendingBatch {
    events: usize,
    first_event_id: Option<CompactString>,
    last_event_id: Option<CompactString>,
    oldest: Option<Instant>,
    /// Players in first-touch order.
    touched: Vec<CompactString>,
    seen: HashSet<CompactString>,
    impact: FantasyImpact,
}

pub struct BatchState {
    store: Arc<PlayerStateStore>,
    table: Arc<ScoringTable>,
    team_index: Arc<dyn TeamIndex>,
    metrics: Arc<PipelineMetrics>,
    batch_size: usize,
    pending: PendingBatch,
}

impl BatchState {
    pub fn new(
        store: Arc<PlayerStateStore>,
        table: Arc<ScoringTable>,
        team_index: Arc<dyn TeamIndex>,
        metrics: Arc<PipelineMetrics>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            table,
            team_index,
            metrics,
            batch_size: batch_size.max(1),
            pending: PendingBatch::default(),
        }
    }

    /// Swap in a reloaded scoring table. Events already folded keep the
    /// points they were scored with.
    pub fn set_table(&mut self, table: Arc<ScoringTable>) {
        self.table = table;
    }

    pub fn pending_events(&self) -> usize {
        self.pending.events
    }

    pub fn fold(&mut self, buffered: BufferedEvent) -> Result<(), StageError> {
        let BufferedEvent { event, ingested_at } = buffered;

        if let Some((stat, value)) = event.stats.iter().find(|(_, value)| !value.is_finite()) {
            return Err(StageError::failed(format!(
                "stat `{}` is not finite: {value}",
                stat.field_name()
            )));
        }

        let outcome = self.store.apply_event(&event, &self.table);

        let pending = &mut self.pending;
        if pending.first_event_id.is_none() {
            pending.first_event_id = Some(event.id.clone());
        }
        pending.last_event_id = Some(event.id.clone());
        pending.oldest.get_or_insert(ingested_at);
        pending.events += 1;
        if let Some(player_id) = &event.player_id
            && pending.seen.insert(player_id.clone())
        {
            pending.touched.push(player_id.clone());
        }
        record_impact(
            &mut pending.impact,
            &event,
            outcome.fantasy_delta,
            self.team_index.as_ref(),
        );

        self.metrics.record_processed(ingested_at.elapsed());
        Ok(())
    }

    /// Close the pending batch if `trigger` makes it due.
    ///
    /// A folded event closes the batch only once it reaches `batch_size`; a
    /// flush closes any non-empty batch. An empty flush yields nothing.
    pub fn take_ready(&mut self, trigger: SinkTrigger) -> Option<ProcessedData> {
        let due = match trigger {
            SinkTrigger::Folded => self.pending.events >= self.batch_size,
            SinkTrigger::Flush => self.pending.events > 0,
        };
        if !due {
            return None;
        }

        let pending = std::mem::take(&mut self.pending);
        let player_updates = pending
            .touched
            .iter()
            .filter_map(|player_id| self.store.peek(player_id))
            .collect();
        let processing_latency_ms = pending
            .oldest
            .map(|oldest| oldest.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();

        Some(ProcessedData {
            trigger: Trigger::Batch {
                batch_id: Uuid::now_v7(),
                event_count: pending.events,
                first_event_id: pending.first_event_id,
                last_event_id: pending.last_event_id,
            },
            player_updates,
            fantasy_impact: pending.impact,
            processing_latency_ms,
            critical: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MomentumConfig;
    use crate::sink::StaticTeamIndex;
    use crate::test_support::{EventExt, event, rushing_play};
    use fanpulse_sdk::objects::{EventType, Stat};

    fn batch(batch_size: usize) -> (BatchState, Arc<PlayerStateStore>, Arc<PipelineMetrics>) {
        let store = Arc::new(PlayerStateStore::new(MomentumConfig::default()));
        let metrics = Arc::new(PipelineMetrics::new());
        let state = BatchState::new(
            store.clone(),
            Arc::new(ScoringTable::default()),
            Arc::new(StaticTeamIndex::default()),
            metrics.clone(),
            batch_size,
        );
        (state, store, metrics)
    }

    #[test]
    fn flush_emits_pending_batch_once() {
        let (mut state, store, metrics) = batch(100);
        for (id, yards) in [("e1", 10.0), ("e2", 15.0), ("e3", 5.0)] {
            state.fold(BufferedEvent::new(rushing_play(id, "p1", yards))).unwrap();
            assert!(state.take_ready(SinkTrigger::Folded).is_none());
        }

        let data = state.take_ready(SinkTrigger::Flush).unwrap();
        match &data.trigger {
            Trigger::Batch {
                event_count,
                first_event_id,
                last_event_id,
                ..
            } => {
                assert_eq!(*event_count, 3);
                assert_eq!(first_event_id.as_deref(), Some("e1"));
                assert_eq!(last_event_id.as_deref(), Some("e3"));
            }
            other => panic!("unexpected trigger {other:?}"),
        }
        assert!(!data.critical);
        assert_eq!(data.player_updates.len(), 1);
        assert_eq!(data.player_updates[0].game_stats[&Stat::RushingYards], 30.0);
        assert!((data.fantasy_impact.point_changes["p1"] - 3.0).abs() < 1e-9);
        assert_eq!(store.peek("p1").unwrap(), data.player_updates[0]);
        assert_eq!(metrics.totals().processed, 3);

        assert!(state.take_ready(SinkTrigger::Flush).is_none());
        assert_eq!(state.pending_events(), 0);
    }

    #[test]
    fn full_batch_closes_on_fold() {
        let (mut state, _, _) = batch(2);
        state.fold(BufferedEvent::new(rushing_play("e1", "p1", 1.0))).unwrap();
        assert!(state.take_ready(SinkTrigger::Folded).is_none());
        state.fold(BufferedEvent::new(rushing_play("e2", "p2", 1.0))).unwrap();

        let data = state.take_ready(SinkTrigger::Folded).unwrap();
        let players: Vec<_> = data
            .player_updates
            .iter()
            .map(|snapshot| snapshot.player_id.as_str())
            .collect();
        assert_eq!(players, ["p1", "p2"]);
    }

    #[test]
    fn empty_flush_emits_nothing() {
        let (mut state, _, _) = batch(10);
        assert!(state.take_ready(SinkTrigger::Flush).is_none());
    }

    #[test]
    fn team_only_events_count_without_player_updates() {
        let (mut state, _, _) = batch(10);
        state
            .fold(BufferedEvent::new(event("e1", EventType::Timeout, "t9", None)))
            .unwrap();
        let data = state.take_ready(SinkTrigger::Flush).unwrap();
        assert!(data.player_updates.is_empty());
        assert!(data.affects_team("t9"));
    }

    #[test]
    fn non_finite_stat_is_a_stage_error() {
        let (mut state, store, _) = batch(10);
        let bad = rushing_play("e1", "p1", 1.0).with_stat(Stat::Receptions, f64::NAN);
        assert!(state.fold(BufferedEvent::new(bad)).is_err());
        assert!(store.peek("p1").is_none());
        assert_eq!(state.pending_events(), 0);
    }

    #[test]
    fn reloaded_table_applies_to_later_events() {
        let (mut state, store, _) = batch(10);
        let mut table = ScoringTable::default();
        table.weights.insert(Stat::RushingYards, 1.0);
        state.set_table(Arc::new(table));

        state.fold(BufferedEvent::new(rushing_play("e1", "p1", 10.0))).unwrap();
        assert_eq!(store.peek("p1").unwrap().fantasy_points, 10.0);
    }
}
