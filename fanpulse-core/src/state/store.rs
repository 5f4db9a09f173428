//! Player state store.
//!
//! Authoritative in-memory state, sharded by [`DashMap`]. Every mutation of
//! one player goes through [`PlayerStateStore::apply_event_at`], which holds
//! that player's shard lock for the whole read-modify-write; partition
//! runners add a single writer per game on top of that.

use compact_str::CompactString;
use dashmap::DashMap;
use fanpulse_sdk::objects::{GameEvent, PlayerStateSnapshot, TeamStateSnapshot};
use time::OffsetDateTime;

use super::player::{PlayerState, TeamState};
use crate::config::MomentumConfig;
use crate::scoring::{ScoringTable, score};

/// Result of applying (or projecting) one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Player snapshot after the event, for events that name a player.
    pub player: Option<PlayerStateSnapshot>,
    pub team: TeamStateSnapshot,
    pub fantasy_delta: f64,
}

pub struct PlayerStateStore {
    players: DashMap<CompactString, PlayerState>,
    teams: DashMap<CompactString, TeamState>,
    momentum: MomentumConfig,
}

impl PlayerStateStore {
    pub fn new(momentum: MomentumConfig) -> Self {
        Self {
            players: DashMap::new(),
            teams: DashMap::new(),
            momentum,
        }
    }

    pub fn momentum_config(&self) -> &MomentumConfig {
        &self.momentum
    }

    /// Snapshot of a player, creating a zeroed state on first reference.
    pub fn get(&self, player_id: &str) -> PlayerStateSnapshot {
        let key = CompactString::from(player_id);
        let entry = self
            .players
            .entry(key.clone())
            .or_insert_with(|| PlayerState::zeroed(OffsetDateTime::now_utc()));
        entry.snapshot(&key)
    }

    /// Snapshot of a player without creating one.
    pub fn peek(&self, player_id: &str) -> Option<PlayerStateSnapshot> {
        self.players
            .get(player_id)
            .map(|entry| entry.value().snapshot(entry.key()))
    }

    pub fn team(&self, team_id: &str) -> Option<TeamStateSnapshot> {
        self.teams
            .get(team_id)
            .map(|entry| entry.value().snapshot(entry.key()))
    }

    /// Snapshots of every known player, in no particular order.
    pub fn players(&self) -> Vec<PlayerStateSnapshot> {
        self.players
            .iter()
            .map(|entry| entry.value().snapshot(entry.key()))
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Decayed momentum of a player at `now`, without mutating state.
    pub fn momentum_at(&self, player_id: &str, now: OffsetDateTime) -> Option<f64> {
        self.players
            .get(player_id)
            .map(|state| state.momentum_at(now, &self.momentum))
    }

    pub fn apply_event(&self, event: &GameEvent, table: &ScoringTable) -> ApplyOutcome {
        self.apply_event_at(event, table, OffsetDateTime::now_utc())
    }

    /// Fold `event` into the player and team state. `now` becomes `lastUpdate`.
    pub fn apply_event_at(
        &self,
        event: &GameEvent,
        table: &ScoringTable,
        now: OffsetDateTime,
    ) -> ApplyOutcome {
        let fantasy_delta = score(event, table);

        let player = event.player_id.as_ref().map(|player_id| {
            let mut state = self
                .players
                .entry(player_id.clone())
                .or_insert_with(|| PlayerState::zeroed(now));
            state.apply(event, fantasy_delta, &self.momentum, now);
            state.snapshot(player_id)
        });

        let team = {
            let mut state = self
                .teams
                .entry(event.team_id.clone())
                .or_insert_with(|| TeamState::zeroed(now));
            state.apply(event, now);
            state.snapshot(&event.team_id)
        };

        ApplyOutcome {
            player,
            team,
            fantasy_delta,
        }
    }

    /// What [`apply_event_at`](Self::apply_event_at) would produce, computed
    /// on copies. The store is left untouched.
    pub fn project(
        &self,
        event: &GameEvent,
        table: &ScoringTable,
        now: OffsetDateTime,
    ) -> ApplyOutcome {
        let fantasy_delta = score(event, table);

        let player = event.player_id.as_ref().map(|player_id| {
            let mut state = self
                .players
                .get(player_id)
                .map(|state| state.value().clone())
                .unwrap_or_else(|| PlayerState::zeroed(now));
            state.apply(event, fantasy_delta, &self.momentum, now);
            state.snapshot(player_id)
        });

        let mut team = self
            .teams
            .get(&event.team_id)
            .map(|state| state.value().clone())
            .unwrap_or_else(|| TeamState::zeroed(now));
        team.apply(event, now);

        ApplyOutcome {
            player,
            team: team.snapshot(&event.team_id),
            fantasy_delta,
        }
    }
}
