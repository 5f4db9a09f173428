//! Event source adapter.
//!
//! Validates a [`RawEvent`] from a feed into the canonical [`GameEvent`].
//! Required fields are checked here and nowhere else; downstream stages can
//! rely on them.
//!
//! Field mapping for the `data` bag:
//!
//! * keys naming a [`Stat`] (snake_case or camelCase) become stat deltas;
//!   numeric strings are accepted, `null` is treated as absent;
//! * `type` / `playType` / `play_type` set the play direction, and generic
//!   `yards` (or `touchdowns`) are additionally credited to the matching
//!   passing/rushing/receiving stat;
//! * `impact` overrides the default momentum impact;
//! * everything else is kept in `extra`.

use compact_str::CompactString;
use fanpulse_sdk::objects::{
    EventTimestamp, EventType, GameEvent, PlayType, RawEvent, Stat, StatLine,
};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Why a feed message could not be turned into a [`GameEvent`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedEvent {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown event type `{0}`")]
    UnknownType(String),

    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error("field `{field}` is not a number")]
    NotANumber { field: String },
}

const PLAY_TYPE_KEYS: [&str; 3] = ["playType", "play_type", "type"];
const IMPACT_KEY: &str = "impact";
const TOUCHDOWNS_KEY: &str = "touchdowns";

/// Normalize a feed message. `received_at` stands in for a missing timestamp.
pub fn normalize(raw: RawEvent, received_at: OffsetDateTime) -> Result<GameEvent, MalformedEvent> {
    let RawEvent {
        id,
        event_type,
        game_id,
        team_id,
        player_id,
        timestamp,
        sequence,
        data,
    } = raw;

    let id = required(id, "id")?;
    let kind = required(event_type, "type")?
        .parse::<EventType>()
        .map_err(|err| MalformedEvent::UnknownType(err.0))?;
    let game_id = required(game_id, "gameId")?;
    let team_id = required(team_id, "teamId")?;
    let player_id = player_id
        .filter(|value| !value.trim().is_empty())
        .map(CompactString::from);

    let timestamp = match timestamp {
        Some(ts) => parse_timestamp(ts)?,
        None => received_at,
    };

    let mut stats = StatLine::new();
    let mut extra = serde_json::Map::new();
    let mut play_type = None;
    let mut impact = None;
    let mut touchdowns = None;

    for (key, value) in data {
        if value.is_null() {
            continue;
        }
        if let Some(stat) = Stat::from_field_name(&key) {
            let amount = number(&key, &value)?;
            *stats.entry(stat).or_insert(0.0) += amount;
        } else if key == IMPACT_KEY {
            impact = Some(number(&key, &value)?);
        } else if key == TOUCHDOWNS_KEY {
            touchdowns = Some(number(&key, &value)?);
        } else if PLAY_TYPE_KEYS.contains(&key.as_str())
            && let Some(parsed) = value.as_str().and_then(PlayType::parse)
        {
            play_type = Some(parsed);
        } else {
            extra.insert(key, value);
        }
    }

    if let Some(direction) = play_type {
        let generic_yards = stats.get(&Stat::Yards).copied();
        let specific = direction.yards_stat();
        if let Some(yards) = generic_yards
            && !stats.contains_key(&specific)
        {
            stats.insert(specific, yards);
        }
        if let Some(count) = touchdowns.take() {
            *stats.entry(touchdown_stat(direction)).or_insert(0.0) += count;
        }
    }
    if let Some(count) = touchdowns {
        extra.insert(TOUCHDOWNS_KEY.to_owned(), Value::from(count));
    }

    Ok(GameEvent {
        id,
        kind,
        game_id,
        team_id,
        player_id,
        timestamp,
        sequence,
        stats,
        play_type,
        impact,
        extra,
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<CompactString, MalformedEvent> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(CompactString::from(value)),
        _ => Err(MalformedEvent::MissingField(field)),
    }
}

fn number(field: &str, value: &Value) -> Result<f64, MalformedEvent> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| MalformedEvent::NotANumber {
            field: field.to_owned(),
        })
}

fn parse_timestamp(ts: EventTimestamp) -> Result<OffsetDateTime, MalformedEvent> {
    match ts {
        EventTimestamp::Millis(ms) => from_millis(ms),
        EventTimestamp::FractionalMillis(ms) if ms.is_finite() => {
            OffsetDateTime::from_unix_timestamp_nanos((ms * 1_000_000.0) as i128)
                .map_err(|_| MalformedEvent::InvalidTimestamp(ms.to_string()))
        }
        EventTimestamp::FractionalMillis(ms) => {
            Err(MalformedEvent::InvalidTimestamp(ms.to_string()))
        }
        EventTimestamp::Text(text) => {
            if let Ok(parsed) = OffsetDateTime::parse(&text, &Rfc3339) {
                return Ok(parsed);
            }
            match text.trim().parse::<i64>() {
                Ok(ms) => from_millis(ms),
                Err(_) => Err(MalformedEvent::InvalidTimestamp(text)),
            }
        }
    }
}

fn from_millis(ms: i64) -> Result<OffsetDateTime, MalformedEvent> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|_| MalformedEvent::InvalidTimestamp(ms.to_string()))
}

fn touchdown_stat(direction: PlayType) -> Stat {
    match direction {
        PlayType::Rushing => Stat::RushingTouchdowns,
        PlayType::Passing => Stat::PassingTouchdowns,
        PlayType::Receiving => Stat::ReceivingTouchdowns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawEvent {
        serde_json::from_value(value).unwrap()
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn score_event_with_points() {
        let event = normalize(
            raw(json!({
                "id": "e1", "type": "score", "gameId": "g1", "teamId": "t1",
                "playerId": "p1", "sequence": 4, "data": {"points": 6}
            })),
            now(),
        )
        .unwrap();

        assert_eq!(event.kind, EventType::Score);
        assert_eq!(event.player_id.as_deref(), Some("p1"));
        assert_eq!(event.sequence, Some(4));
        assert_eq!(event.stat(Stat::Points), 6.0);
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn rushing_yards_are_attributed() {
        let event = normalize(
            raw(json!({
                "id": "e2", "type": "play", "gameId": "g1", "teamId": "t1",
                "playerId": "p2", "data": {"yards": 10, "type": "rushing", "quarter": 2}
            })),
            now(),
        )
        .unwrap();

        assert_eq!(event.play_type, Some(PlayType::Rushing));
        assert_eq!(event.stat(Stat::Yards), 10.0);
        assert_eq!(event.stat(Stat::RushingYards), 10.0);
        assert_eq!(event.stat(Stat::PassingYards), 0.0);
        assert_eq!(event.extra.get("quarter"), Some(&json!(2)));
    }

    #[test]
    fn explicit_specific_yards_win_over_generic() {
        let event = normalize(
            raw(json!({
                "id": "e3", "type": "play", "gameId": "g1", "teamId": "t1",
                "data": {"yards": 10, "receivingYards": 12, "playType": "receiving"}
            })),
            now(),
        )
        .unwrap();
        assert_eq!(event.stat(Stat::ReceivingYards), 12.0);
    }

    #[test]
    fn touchdowns_follow_play_direction() {
        let event = normalize(
            raw(json!({
                "id": "e4", "type": "play", "gameId": "g1", "teamId": "t1",
                "data": {"touchdowns": 1, "playType": "pass"}
            })),
            now(),
        )
        .unwrap();
        assert_eq!(event.stat(Stat::PassingTouchdowns), 1.0);
        assert!(!event.extra.contains_key("touchdowns"));

        let undirected = normalize(
            raw(json!({
                "id": "e5", "type": "play", "gameId": "g1", "teamId": "t1",
                "data": {"touchdowns": 1}
            })),
            now(),
        )
        .unwrap();
        assert!(undirected.stats.is_empty());
        assert_eq!(undirected.extra.get("touchdowns"), Some(&json!(1.0)));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let missing_team = raw(json!({"id": "e1", "type": "play", "gameId": "g1"}));
        assert_eq!(
            normalize(missing_team, now()),
            Err(MalformedEvent::MissingField("teamId"))
        );

        let blank_id = raw(json!({"id": " ", "type": "play", "gameId": "g1", "teamId": "t1"}));
        assert_eq!(
            normalize(blank_id, now()),
            Err(MalformedEvent::MissingField("id"))
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let bad = raw(json!({"id": "e1", "type": "fumble", "gameId": "g1", "teamId": "t1"}));
        assert_eq!(
            normalize(bad, now()),
            Err(MalformedEvent::UnknownType("fumble".into()))
        );
    }

    #[test]
    fn non_numeric_stat_is_rejected() {
        let bad = raw(json!({
            "id": "e1", "type": "play", "gameId": "g1", "teamId": "t1",
            "data": {"yards": "a lot"}
        }));
        assert!(matches!(
            normalize(bad, now()),
            Err(MalformedEvent::NotANumber { .. })
        ));
    }

    #[test]
    fn timestamps_parse_from_millis_and_rfc3339() {
        let millis = normalize(
            raw(json!({
                "id": "e1", "type": "timeout", "gameId": "g1", "teamId": "t1",
                "timestamp": 1_000
            })),
            now(),
        )
        .unwrap();
        assert_eq!(millis.timestamp.unix_timestamp(), 1);

        let text = normalize(
            raw(json!({
                "id": "e1", "type": "timeout", "gameId": "g1", "teamId": "t1",
                "timestamp": "1970-01-01T00:00:02Z"
            })),
            now(),
        )
        .unwrap();
        assert_eq!(text.timestamp.unix_timestamp(), 2);

        let fractional = normalize(
            raw(json!({
                "id": "e1", "type": "timeout", "gameId": "g1", "teamId": "t1",
                "timestamp": 1_500.5
            })),
            now(),
        )
        .unwrap();
        assert_eq!(fractional.timestamp.unix_timestamp_nanos(), 1_500_500_000);

        let bad = raw(json!({
            "id": "e1", "type": "timeout", "gameId": "g1", "teamId": "t1",
            "timestamp": "yesterday"
        }));
        assert!(matches!(
            normalize(bad, now()),
            Err(MalformedEvent::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn null_fields_are_absent() {
        let event = normalize(
            raw(json!({
                "id": "e1", "type": "play", "gameId": "g1", "teamId": "t1",
                "playerId": null, "data": {"yards": null}
            })),
            now(),
        )
        .unwrap();
        assert!(event.player_id.is_none());
        assert!(event.stats.is_empty());
    }
}
