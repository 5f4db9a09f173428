//! Builders shared by unit tests.

use std::time::Duration;

use fanpulse_sdk::objects::{EventType, GameEvent, PlayType, Stat};
use time::OffsetDateTime;

pub fn event(id: &str, kind: EventType, team: &str, player: Option<&str>) -> GameEvent {
    GameEvent {
        id: id.into(),
        kind,
        game_id: "g1".into(),
        team_id: team.into(),
        player_id: player.map(Into::into),
        timestamp: OffsetDateTime::UNIX_EPOCH,
        sequence: None,
        stats: Default::default(),
        play_type: None,
        impact: None,
        extra: Default::default(),
    }
}

pub trait EventExt: Sized {
    fn with_stat(self, stat: Stat, value: f64) -> Self;
    fn with_play_type(self, play_type: PlayType) -> Self;
    fn with_impact(self, impact: f64) -> Self;
    fn in_game(self, game_id: &str, sequence: u64) -> Self;
}

impl EventExt for GameEvent {
    fn with_stat(mut self, stat: Stat, value: f64) -> Self {
        *self.stats.entry(stat).or_insert(0.0) += value;
        self
    }

    fn with_play_type(mut self, play_type: PlayType) -> Self {
        self.play_type = Some(play_type);
        self
    }

    fn with_impact(mut self, impact: f64) -> Self {
        self.impact = Some(impact);
        self
    }

    fn in_game(mut self, game_id: &str, sequence: u64) -> Self {
        self.game_id = game_id.into();
        self.sequence = Some(sequence);
        self
    }
}

/// A rushing play crediting both generic and rushing yards.
pub fn rushing_play(id: &str, player: &str, yards: f64) -> GameEvent {
    event(id, EventType::Play, "t1", Some(player))
        .with_play_type(PlayType::Rushing)
        .with_stat(Stat::Yards, yards)
        .with_stat(Stat::RushingYards, yards)
}

pub fn epoch_plus(offset: Duration) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + offset
}
