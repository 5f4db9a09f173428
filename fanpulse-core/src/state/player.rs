//! Running per-player and per-team state.

use compact_str::CompactString;
use fanpulse_sdk::objects::{
    EventType, GameEvent, PlayerStateSnapshot, Stat, StatLine, TeamStateSnapshot,
};
use time::OffsetDateTime;

use crate::config::MomentumConfig;

/// Decay factor `exp(-Δt / half_life)` for an elapsed wall-clock span.
///
/// Negative spans (clock adjustments, out-of-order processing times) are
/// treated as zero.
pub fn decay_factor(elapsed: time::Duration, config: &MomentumConfig) -> f64 {
    let half_life = config.half_life.as_secs_f64();
    if half_life <= 0.0 {
        return 0.0;
    }
    let elapsed = elapsed.as_seconds_f64().max(0.0);
    (-elapsed / half_life).exp()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub game_stats: StatLine,
    pub fantasy_points: f64,
    pub momentum: f64,
    /// Reserved; always zero.
    pub fatigue: f64,
    pub last_update: OffsetDateTime,
}

impl PlayerState {
    pub fn zeroed(now: OffsetDateTime) -> Self {
        Self {
            game_stats: StatLine::new(),
            fantasy_points: 0.0,
            momentum: 0.0,
            fatigue: 0.0,
            last_update: now,
        }
    }

    /// Fold one event into this state.
    pub fn apply(
        &mut self,
        event: &GameEvent,
        fantasy_delta: f64,
        momentum: &MomentumConfig,
        now: OffsetDateTime,
    ) {
        for (stat, delta) in &event.stats {
            *self.game_stats.entry(*stat).or_insert(0.0) += delta;
        }
        self.fantasy_points += fantasy_delta;

        let impact = event
            .impact
            .filter(|impact| impact.is_finite())
            .unwrap_or(momentum.default_impact);
        let decayed = self.momentum * decay_factor(now - self.last_update, momentum);
        self.momentum = (decayed + impact).clamp(-1.0, 1.0);
        self.last_update = now;
    }

    /// Momentum as it would read at `now` with no further events.
    pub fn momentum_at(&self, now: OffsetDateTime, config: &MomentumConfig) -> f64 {
        self.momentum * decay_factor(now - self.last_update, config)
    }

    pub fn stat(&self, stat: Stat) -> f64 {
        self.game_stats.get(&stat).copied().unwrap_or(0.0)
    }

    pub fn snapshot(&self, player_id: &CompactString) -> PlayerStateSnapshot {
        PlayerStateSnapshot {
            player_id: player_id.clone(),
            game_stats: self.game_stats.clone(),
            fantasy_points: self.fantasy_points,
            momentum: self.momentum,
            fatigue: self.fatigue,
            last_update: self.last_update,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamState {
    /// Sum of `points` over every applied event.
    pub points: f64,
    pub events: u64,
    pub injuries: u64,
    pub last_update: OffsetDateTime,
}

impl TeamState {
    pub fn zeroed(now: OffsetDateTime) -> Self {
        Self {
            points: 0.0,
            events: 0,
            injuries: 0,
            last_update: now,
        }
    }

    pub fn apply(&mut self, event: &GameEvent, now: OffsetDateTime) {
        self.points += event.stat(Stat::Points);
        self.events += 1;
        if event.kind == EventType::Injury {
            self.injuries += 1;
        }
        self.last_update = now;
    }

    pub fn snapshot(&self, team_id: &CompactString) -> TeamStateSnapshot {
        TeamStateSnapshot {
            team_id: team_id.clone(),
            points: self.points,
            events: self.events,
            injuries: self.injuries,
            last_update: self.last_update,
        }
    }
}
