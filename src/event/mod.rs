//! Event record data model.
//!
//! An ingested report moves through two shapes: a [`NewEvent`] produced by
//! the normalizer, and an [`EventRecord`] once the store has assigned it a
//! surrogate id.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub mod normalizer;

pub use normalizer::{normalize, parse_payload, searchable_strings, NormalizeError};

/// Raw payload as received from the client, key order preserved.
pub type Payload = Map<String, Value>;

/// A normalized event that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub event_id: String,
    pub project_id: i64,
    pub timestamp: DateTime<Utc>,
    pub searchable_strings: String,
    pub event: Payload,
}

impl NewEvent {
    /// Attach the store-assigned id.
    pub fn into_record(self, id: i64) -> EventRecord {
        EventRecord {
            id,
            event_id: self.event_id,
            project_id: self.project_id,
            timestamp: self.timestamp,
            searchable_strings: self.searchable_strings,
            event: self.event,
        }
    }
}

/// A stored event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub event_id: String,
    pub project_id: i64,
    pub timestamp: DateTime<Utc>,
    pub searchable_strings: String,
    pub event: Payload,
}

impl EventRecord {
    /// Whether `searchable_strings` still matches what the normalizer
    /// derives from the stored payload.
    pub fn is_consistent(&self) -> bool {
        normalizer::searchable_strings(&self.event)
            .map(|derived| derived == self.searchable_strings)
            .unwrap_or(false)
    }
}

/// Lookup key for a single event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Store-assigned surrogate id.
    Id(i64),
    /// Client-supplied event id.
    EventId(String),
}

impl EventKey {
    /// Resolve a textual identifier: integers address the surrogate id,
    /// anything else the client event id.
    pub fn parse(identifier: &str) -> Self {
        match identifier.parse::<i64>() {
            Ok(id) => EventKey::Id(id),
            Err(_) => EventKey::EventId(identifier.to_string()),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Id(id) => write!(f, "id={}", id),
            EventKey::EventId(event_id) => write!(f, "event_id={}", event_id),
        }
    }
}

/// Storage form of a timestamp.
///
/// Fixed width with nanosecond precision, so lexical order is chronological
/// order and parsing it back yields the identical instant.
pub fn timestamp_to_storage(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a timestamp previously written by [`timestamp_to_storage`].
pub fn timestamp_from_storage(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
