use super::context::TokenFinder;
use crate::event::Event;
use chrono::{SecondsFormat, TimeZone, Utc};
use rand::Rng;
use serde_json::Value;

pub const KEY_EVENT_TYPE: &str = "~type";
pub const KEY_EVENT_SOURCE: &str = "~source";
pub const KEY_TIMESTAMP_UNIX: &str = "~timestampu";
pub const KEY_TIMESTAMP_ISO8601: &str = "~timestampz";
pub const KEY_TIMESTAMP_PLATFORM: &str = "~timestampp";
pub const KEY_SDK_VERSION: &str = "~sdkver";
pub const KEY_CACHE_BUST: &str = "~cachebust";
pub const KEY_ALL_JSON: &str = "~all_json";

/// Resolves tokens against one event.
///
/// `~`-prefixed keys describe the event itself; anything else is a dot path
/// into the event data.
pub struct EventTokenFinder<'a> {
    event: &'a Event,
    sdk_version: String,
}

impl<'a> EventTokenFinder<'a> {
    pub fn new(event: &'a Event) -> Self {
        Self {
            event,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_sdk_version(mut self, sdk_version: impl Into<String>) -> Self {
        self.sdk_version = sdk_version.into();
        self
    }

    fn timestamp(&self, format: SecondsFormat, use_z: bool) -> Option<Value> {
        Utc.timestamp_millis_opt(self.event.timestamp_ms)
            .single()
            .map(|date| Value::String(date.to_rfc3339_opts(format, use_z)))
    }
}

impl TokenFinder for EventTokenFinder<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        match key {
            KEY_EVENT_TYPE => Some(Value::from(self.event.event_type.clone())),
            KEY_EVENT_SOURCE => Some(Value::from(self.event.source.clone())),
            KEY_TIMESTAMP_UNIX => Some(Value::from(self.event.timestamp_ms / 1000)),
            KEY_TIMESTAMP_ISO8601 => self.timestamp(SecondsFormat::Secs, true),
            KEY_TIMESTAMP_PLATFORM => self.timestamp(SecondsFormat::Millis, false),
            KEY_SDK_VERSION => Some(Value::from(self.sdk_version.clone())),
            KEY_CACHE_BUST => {
                let bust: u32 = rand::thread_rng().gen_range(0..100_000_000);
                Some(Value::from(bust.to_string()))
            }
            KEY_ALL_JSON => serde_json::to_string(&self.event.data).ok().map(Value::from),
            path => TokenFinder::get(&self.event.data, path),
        }
    }
}
