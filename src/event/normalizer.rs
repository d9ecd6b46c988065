//! Payload normalization.
//!
//! Turns a client payload into a [`NewEvent`] or rejects it. Everything here
//! is pure: no storage access, no clock reads. `searchable_strings` is a
//! function of the payload alone so it can be re-derived from stored events.

use std::io;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{NewEvent, Payload};

/// Result type for normalization.
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Errors raised while normalizing a payload.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Invalid field '{field}': {reason}")]
    Validation { field: &'static str, reason: String },
}

impl NormalizeError {
    fn missing(field: &'static str) -> Self {
        NormalizeError::Validation {
            field,
            reason: "field is required".to_string(),
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        NormalizeError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Payload field names.
pub mod fields {
    pub const EVENT_ID: &str = "event_id";
    pub const TIMESTAMP: &str = "timestamp";
    pub const MESSAGE: &str = "message";
    pub const EXCEPTION: &str = "exception";
}

/// Naive (offset-less) timestamp layouts, read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a request body into a payload object.
pub fn parse_payload(body: &[u8]) -> Result<Payload> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| NormalizeError::MalformedPayload {
            reason: e.to_string(),
        })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(NormalizeError::MalformedPayload {
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

/// Validate a payload and build the storable event for `project_id`.
pub fn normalize(project_id: i64, payload: Payload) -> Result<NewEvent> {
    let event_id = match payload.get(fields::EVENT_ID) {
        None | Some(Value::Null) => return Err(NormalizeError::missing(fields::EVENT_ID)),
        Some(Value::String(s)) if s.is_empty() => {
            return Err(NormalizeError::invalid(fields::EVENT_ID, "must not be empty"))
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(NormalizeError::invalid(
                fields::EVENT_ID,
                format!("expected a string, got {}", json_kind(other)),
            ))
        }
    };

    let timestamp = match payload.get(fields::TIMESTAMP) {
        None | Some(Value::Null) => return Err(NormalizeError::missing(fields::TIMESTAMP)),
        Some(value) => parse_timestamp(value)?,
    };

    let searchable_strings = searchable_strings(&payload)?;

    Ok(NewEvent {
        event_id,
        project_id,
        timestamp,
        searchable_strings,
        event: payload,
    })
}

/// Derive the search text: the message, a space, then the serialized
/// exception (`{}` when absent).
pub fn searchable_strings(payload: &Payload) -> Result<String> {
    let message = match payload.get(fields::MESSAGE) {
        None => "",
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(NormalizeError::invalid(
                fields::MESSAGE,
                format!("expected a string, got {}", json_kind(other)),
            ))
        }
    };

    let exception = match payload.get(fields::EXCEPTION) {
        None => "{}".to_string(),
        Some(value) => to_spaced_json(value)?,
    };

    Ok(format!("{} {}", message, exception))
}

/// Years representable in the fixed-width storage form.
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    let ts = timestamp_from_value(value)?;
    if !STORABLE_YEARS.contains(&ts.year()) {
        return Err(NormalizeError::invalid(
            fields::TIMESTAMP,
            format!("year {} outside 0000..=9999", ts.year()),
        ));
    }
    Ok(ts)
}

fn timestamp_from_value(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Ok(dt.with_timezone(&Utc));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
                .ok_or_else(|| {
                    NormalizeError::invalid(
                        fields::TIMESTAMP,
                        format!("unparseable date-time '{}'", raw),
                    )
                })
        }
        Value::Number(n) => {
            let secs = n
                .as_f64()
                .ok_or_else(|| NormalizeError::invalid(fields::TIMESTAMP, "not a finite number"))?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos).ok_or_else(|| {
                NormalizeError::invalid(fields::TIMESTAMP, format!("epoch {} out of range", secs))
            })
        }
        other => Err(NormalizeError::invalid(
            fields::TIMESTAMP,
            format!("expected a date-time string or epoch seconds, got {}", json_kind(other)),
        )),
    }
}

/// Serialize with `", "` and `": "` separators, the item and key separators
/// of Python's `json.dumps`. Non-ASCII text is written as-is, not escaped.
fn to_spaced_json(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value
        .serialize(&mut ser)
        .map_err(|e| NormalizeError::invalid(fields::EXCEPTION, e.to_string()))?;
    String::from_utf8(buf).map_err(|e| NormalizeError::invalid(fields::EXCEPTION, e.to_string()))
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
