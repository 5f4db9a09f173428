//! Game event types.
//!
//! Two shapes exist:
//!
//! * [`RawEvent`] is what an upstream feed publishes. Every field is optional
//!   and `data` is an open JSON bag, so a badly formed message still
//!   deserializes and can be rejected with a precise reason.
//! * [`GameEvent`] is the canonical, validated form produced by the event
//!   source adapter in `fanpulse-core`. Recognized stat fields are lifted into
//!   a typed [`StatLine`]; anything else is kept verbatim in `extra`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of game event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Play,
    Score,
    Injury,
    Substitution,
    Penalty,
    Timeout,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Play,
        EventType::Score,
        EventType::Injury,
        EventType::Substitution,
        EventType::Penalty,
        EventType::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Play => "play",
            EventType::Score => "score",
            EventType::Injury => "injury",
            EventType::Substitution => "substitution",
            EventType::Penalty => "penalty",
            EventType::Timeout => "timeout",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an event type string is not one of the known kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        EventType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownEventType(s.to_owned()))
    }
}

/// Statistic tracked per player.
///
/// Serialized in `snake_case`, which is also the field name the adapter
/// recognizes inside an event's `data` bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Points,
    Yards,
    PassingYards,
    PassingTouchdowns,
    Interceptions,
    RushingYards,
    RushingTouchdowns,
    ReceivingYards,
    ReceivingTouchdowns,
    Receptions,
    FumblesLost,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    Turnovers,
}

impl Stat {
    pub const ALL: [Stat; 16] = [
        Stat::Points,
        Stat::Yards,
        Stat::PassingYards,
        Stat::PassingTouchdowns,
        Stat::Interceptions,
        Stat::RushingYards,
        Stat::RushingTouchdowns,
        Stat::ReceivingYards,
        Stat::ReceivingTouchdowns,
        Stat::Receptions,
        Stat::FumblesLost,
        Stat::Rebounds,
        Stat::Assists,
        Stat::Steals,
        Stat::Blocks,
        Stat::Turnovers,
    ];

    /// Field name as it appears in the `data` bag and in serialized stat maps.
    pub fn field_name(&self) -> &'static str {
        match self {
            Stat::Points => "points",
            Stat::Yards => "yards",
            Stat::PassingYards => "passing_yards",
            Stat::PassingTouchdowns => "passing_touchdowns",
            Stat::Interceptions => "interceptions",
            Stat::RushingYards => "rushing_yards",
            Stat::RushingTouchdowns => "rushing_touchdowns",
            Stat::ReceivingYards => "receiving_yards",
            Stat::ReceivingTouchdowns => "receiving_touchdowns",
            Stat::Receptions => "receptions",
            Stat::FumblesLost => "fumbles_lost",
            Stat::Rebounds => "rebounds",
            Stat::Assists => "assists",
            Stat::Steals => "steals",
            Stat::Blocks => "blocks",
            Stat::Turnovers => "turnovers",
        }
    }

    /// Look up a stat by its field name. Accepts the camelCase spelling too,
    /// since feeds are not consistent about it.
    pub fn from_field_name(name: &str) -> Option<Stat> {
        Stat::ALL.into_iter().find(|stat| {
            let field = stat.field_name();
            field == name || field.replace('_', "").eq_ignore_ascii_case(name)
        })
    }

    /// Touchdown stats, used to classify touchdown-equivalent plays.
    pub fn is_touchdown(&self) -> bool {
        matches!(
            self,
            Stat::PassingTouchdowns | Stat::RushingTouchdowns | Stat::ReceivingTouchdowns
        )
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Per-event stat deltas (or accumulated totals in a player snapshot).
pub type StatLine = BTreeMap<Stat, f64>;

/// Direction of a play, used to attribute generic `yards`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayType {
    Rushing,
    Passing,
    Receiving,
}

impl PlayType {
    /// The specific yardage stat generic `yards` is credited to.
    pub fn yards_stat(&self) -> Stat {
        match self {
            PlayType::Rushing => Stat::RushingYards,
            PlayType::Passing => Stat::PassingYards,
            PlayType::Receiving => Stat::ReceivingYards,
        }
    }

    pub fn parse(value: &str) -> Option<PlayType> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rushing" | "rush" | "run" => Some(PlayType::Rushing),
            "passing" | "pass" => Some(PlayType::Passing),
            "receiving" | "reception" => Some(PlayType::Receiving),
            _ => None,
        }
    }
}

/// Timestamp as sent by a feed: epoch milliseconds (integral or fractional)
/// or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    Millis(i64),
    FractionalMillis(f64),
    Text(String),
}

/// Event as published by an upstream feed, before validation.
///
/// Deserialization only fails on values no feed could mean: ids may be
/// strings or numbers, `sequence` may be a numeric string, and `null`
/// stands for an absent field everywhere, `data` included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default, alias = "game_id", deserialize_with = "lenient::id")]
    pub game_id: Option<String>,
    #[serde(default, alias = "team_id", deserialize_with = "lenient::id")]
    pub team_id: Option<String>,
    #[serde(default, alias = "player_id", deserialize_with = "lenient::id")]
    pub player_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<EventTimestamp>,
    #[serde(default, deserialize_with = "lenient::sequence")]
    pub sequence: Option<u64>,
    #[serde(default, deserialize_with = "lenient::data")]
    pub data: serde_json::Map<String, serde_json::Value>,
}

mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value};

    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected a string or number id, got {other}"
            ))),
        }
    }

    pub fn sequence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number
                .as_u64()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid sequence {number}"))),
            Some(Value::String(text)) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid sequence `{text}`"))),
            Some(other) => Err(D::Error::custom(format!("invalid sequence {other}"))),
        }
    }

    pub fn data<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Map<String, Value>, D::Error> {
        Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Canonical, validated game event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub id: CompactString,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub game_id: CompactString,
    pub team_id: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<CompactString>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub stats: StatLine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_type: Option<PlayType>,
    /// Explicit momentum impact carried by the event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    /// Sport-specific fields the adapter did not recognize.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GameEvent {
    /// Value of a stat delta carried by this event, zero when absent.
    pub fn stat(&self, stat: Stat) -> f64 {
        self.stats.get(&stat).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parses_case_insensitively() {
        assert_eq!("SCORE".parse::<EventType>().unwrap(), EventType::Score);
        assert_eq!(" play ".parse::<EventType>().unwrap(), EventType::Play);
        assert!("touchdown".parse::<EventType>().is_err());
    }

    #[test]
    fn stat_field_names_accept_camel_case() {
        assert_eq!(Stat::from_field_name("rushing_yards"), Some(Stat::RushingYards));
        assert_eq!(Stat::from_field_name("rushingYards"), Some(Stat::RushingYards));
        assert_eq!(Stat::from_field_name("quarter"), None);
    }

    #[test]
    fn raw_event_tolerates_missing_fields() {
        let raw: RawEvent =
            serde_json::from_str(r#"{"type":"score","data":{"points":6}}"#).unwrap();
        assert_eq!(raw.event_type.as_deref(), Some("score"));
        assert!(raw.id.is_none());
        assert_eq!(raw.data.get("points").and_then(|v| v.as_f64()), Some(6.0));
    }

    #[test]
    fn raw_event_accepts_loosely_typed_fields() {
        let raw: RawEvent = serde_json::from_str(
            r#"{"id":42,"type":"timeout","gameId":7,"teamId":"t1","playerId":null,
                "sequence":"7","timestamp":1700000000000.5,"data":null}"#,
        )
        .unwrap();
        assert_eq!(raw.id.as_deref(), Some("42"));
        assert_eq!(raw.game_id.as_deref(), Some("7"));
        assert!(raw.player_id.is_none());
        assert_eq!(raw.sequence, Some(7));
        assert_eq!(
            raw.timestamp,
            Some(EventTimestamp::FractionalMillis(1_700_000_000_000.5))
        );
        assert!(raw.data.is_empty());
    }

    #[test]
    fn raw_event_rejects_unusable_fields() {
        assert!(serde_json::from_str::<RawEvent>(r#"{"id":{"nested":true}}"#).is_err());
        assert!(serde_json::from_str::<RawEvent>(r#"{"sequence":"seven"}"#).is_err());
        assert!(serde_json::from_str::<RawEvent>(r#"{"sequence":-1}"#).is_err());
    }

    #[test]
    fn raw_event_accepts_both_timestamp_forms() {
        let millis: RawEvent = serde_json::from_str(r#"{"timestamp":1700000000000}"#).unwrap();
        assert_eq!(millis.timestamp, Some(EventTimestamp::Millis(1_700_000_000_000)));

        let text: RawEvent =
            serde_json::from_str(r#"{"timestamp":"2024-09-08T17:00:00Z"}"#).unwrap();
        assert_eq!(
            text.timestamp,
            Some(EventTimestamp::Text("2024-09-08T17:00:00Z".into()))
        );
    }

    #[test]
    fn game_event_serializes_stats_by_field_name() {
        let mut stats = StatLine::new();
        stats.insert(Stat::RushingYards, 12.0);
        let event = GameEvent {
            id: "e1".into(),
            kind: EventType::Play,
            game_id: "g1".into(),
            team_id: "t1".into(),
            player_id: Some("p1".into()),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            sequence: Some(3),
            stats,
            play_type: Some(PlayType::Rushing),
            impact: None,
            extra: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "play");
        assert_eq!(json["stats"]["rushing_yards"], 12.0);
        assert_eq!(json["playType"], "rushing");
    }
}
