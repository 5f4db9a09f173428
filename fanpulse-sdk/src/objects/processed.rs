//! Output of the pipeline: processed updates and state snapshots.

use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::event::{GameEvent, StatLine};

/// Point-in-time copy of a player's running state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateSnapshot {
    pub player_id: CompactString,
    pub game_stats: StatLine,
    pub fantasy_points: f64,
    pub momentum: f64,
    pub fatigue: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
}

/// Point-in-time copy of a team's running state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStateSnapshot {
    pub team_id: CompactString,
    pub points: f64,
    pub events: u64,
    pub injuries: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
}

/// What caused a [`ProcessedData`] record to be emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// A single critical event handled by the fast path.
    Event { event: GameEvent },
    /// A flushed batch of events folded by the topology.
    Batch {
        batch_id: Uuid,
        event_count: usize,
        first_event_id: Option<CompactString>,
        last_event_id: Option<CompactString>,
    },
}

/// Fantasy consequences of a processed event or batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FantasyImpact {
    pub affected_teams: BTreeSet<CompactString>,
    pub point_changes: BTreeMap<CompactString, f64>,
}

impl FantasyImpact {
    /// Add a point change for a player, summing with any existing change.
    pub fn add_points(&mut self, player_id: &CompactString, delta: f64) {
        *self.point_changes.entry(player_id.clone()).or_insert(0.0) += delta;
    }

    pub fn is_empty(&self) -> bool {
        self.affected_teams.is_empty() && self.point_changes.is_empty()
    }
}

/// A processed update, emitted by the fast path or by a flushed batch.
///
/// Immutable once built; shared between subscribers by reference count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedData {
    pub trigger: Trigger,
    pub player_updates: Vec<PlayerStateSnapshot>,
    pub fantasy_impact: FantasyImpact,
    /// Wall-clock time from ingestion to emission, in milliseconds.
    pub processing_latency_ms: f64,
    pub critical: bool,
}

impl ProcessedData {
    /// Whether the given team is among the affected teams.
    pub fn affects_team(&self, team_id: &str) -> bool {
        self.fantasy_impact
            .affected_teams
            .iter()
            .any(|team| team.as_str() == team_id)
    }
}
