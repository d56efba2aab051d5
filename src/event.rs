//! Events flowing from the host into history recording and rule evaluation.

use crate::hashing::map_to_fnv1a_hash;
use crate::types::now_ms;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An event dispatched by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub unique_id: String,
    pub name: String,
    pub event_type: String,
    pub source: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Keys that participate in the history fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<String>>,
    pub timestamp_ms: i64,
}

impl Event {
    pub fn builder(
        name: impl Into<String>,
        event_type: impl Into<String>,
        source: impl Into<String>,
    ) -> EventBuilder {
        EventBuilder {
            name: name.into(),
            event_type: event_type.into(),
            source: source.into(),
            data: Map::new(),
            mask: None,
            timestamp_ms: None,
        }
    }

    /// FNV-1a fingerprint of the event data under the event's mask.
    pub fn history_hash(&self) -> i64 {
        map_to_fnv1a_hash(&self.data, self.mask.as_deref())
    }
}

pub struct EventBuilder {
    name: String,
    event_type: String,
    source: String,
    data: Map<String, Value>,
    mask: Option<Vec<String>>,
    timestamp_ms: Option<i64>,
}

impl EventBuilder {
    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn mask(mut self, mask: Vec<String>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn build(self) -> Event {
        Event {
            unique_id: Uuid::new_v4().to_string(),
            name: self.name,
            event_type: self.event_type,
            source: self.source,
            data: self.data,
            mask: self.mask,
            timestamp_ms: self.timestamp_ms.unwrap_or_else(now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_assigns_unique_ids() {
        let first = Event::builder("a", "type", "source").build();
        let second = Event::builder("a", "type", "source").build();
        assert_ne!(first.unique_id, second.unique_id);
        assert!(first.timestamp_ms > 0);
    }

    #[test]
    fn test_history_hash_respects_mask() {
        let data = json!({"key": "value", "other": 1})
            .as_object()
            .cloned()
            .unwrap();
        let event = Event::builder("a", "type", "source")
            .data(data)
            .mask(vec!["key".to_string()])
            .build();
        assert_eq!(event.history_hash(), 4_007_910_315);
    }

    #[test]
    fn test_history_hash_of_empty_event_is_zero() {
        let event = Event::builder("a", "type", "source").build();
        assert_eq!(event.history_hash(), 0);
    }
}
