use crate::hashing::map_to_fnv1a_hash;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One lookup against the event history.
///
/// `mask` is the event data subset to match; it is hashed exactly like
/// recorded events. A `to_ms` of 0 means "now" and a `from_ms` of 0 means
/// the beginning of history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventHistoryRequest {
    pub mask: Map<String, Value>,
    #[serde(default)]
    pub from_ms: i64,
    #[serde(default)]
    pub to_ms: i64,
}

impl EventHistoryRequest {
    pub fn new(mask: Map<String, Value>, from_ms: i64, to_ms: i64) -> Self {
        Self {
            mask,
            from_ms,
            to_ms,
        }
    }

    /// Fingerprint of the mask, as stored in the `eventHash` column.
    pub fn mask_hash(&self) -> i64 {
        map_to_fnv1a_hash(&self.mask, None)
    }
}
