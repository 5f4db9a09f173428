//! Request/response bodies for `POST /api/v1/events`.

use serde::{Deserialize, Serialize};

use super::event::RawEvent;

/// A single event or an array of events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngestRequest {
    Many(Vec<RawEvent>),
    One(Box<RawEvent>),
}

impl IngestRequest {
    pub fn into_events(self) -> Vec<RawEvent> {
        match self {
            IngestRequest::Many(events) => events,
            IngestRequest::One(event) => vec![*event],
        }
    }
}

/// Decode a request body into its events, one result per element.
///
/// An array yields one entry per element, so a single bad element does not
/// sink the rest of the batch. Any other value is treated as one event.
pub fn decode_events(value: serde_json::Value) -> Vec<Result<RawEvent, serde_json::Error>> {
    match value {
        serde_json::Value::Array(items) => {
            items.into_iter().map(serde_json::from_value).collect()
        }
        other => vec![serde_json::from_value(other)],
    }
}

/// Why a submitted event was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEvent {
    /// Position of the event in the submitted array.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub accepted: usize,
    pub critical: usize,
    pub rejected: Vec<RejectedEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_object_or_array() {
        let one: IngestRequest = serde_json::from_str(r#"{"id":"a","type":"play"}"#).unwrap();
        assert_eq!(one.into_events().len(), 1);

        let many: IngestRequest =
            serde_json::from_str(r#"[{"id":"a","type":"play"},{"id":"b","type":"score"}]"#)
                .unwrap();
        assert_eq!(many.into_events().len(), 2);
    }

    #[test]
    fn decode_events_keeps_good_elements_beside_bad_ones() {
        let value = serde_json::json!([
            {"id": "e1", "type": "timeout", "gameId": "g1", "teamId": "t1", "data": null},
            {"id": {"nested": true}, "type": "play"},
            {"id": 42, "type": "play"}
        ]);
        let decoded = decode_events(value);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].as_ref().unwrap().id.as_deref(), Some("e1"));
        assert!(decoded[1].is_err());
        assert_eq!(decoded[2].as_ref().unwrap().id.as_deref(), Some("42"));

        let single = decode_events(serde_json::json!({"id": "e1"}));
        assert_eq!(single.len(), 1);
        assert!(single[0].is_ok());

        let scalar = decode_events(serde_json::json!("not an event"));
        assert!(scalar[0].is_err());
    }
}
