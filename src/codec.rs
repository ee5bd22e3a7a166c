//! Canonical line codec: `<RFC3339 timestamp> | <i64 user_id> | <event_type> | <JSON payload>`.
//!
//! `encode(&decode(line)?) == line` for every canonical line, and `decode(&encode(e)) == e`
//! for every event produced by `decode`.

use crate::error::DecodeError;
use crate::types::{Event, Timestamp, UserId};
use chrono::{DateTime, SecondsFormat, SubsecRound};
use serde::de::IgnoredAny;
use std::fmt;
use std::str::FromStr;

/// Field separator: space, pipe, space.
pub const FIELD_SEPARATOR: &str = " | ";

/// Number of fields in a canonical line.
pub const FIELD_COUNT: usize = 4;

/// Parses an RFC 3339 timestamp, truncated to whole seconds.
///
/// The original offset is kept so the timestamp re-encodes the way it was written.
pub fn parse_timestamp(value: &str) -> Result<Timestamp, DecodeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.trunc_subsecs(0))
        .map_err(|e| DecodeError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Formats a timestamp in canonical form: second precision, `Z` for a zero offset.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decodes one line into an [`Event`].
///
/// Each field is trimmed before validation. The payload must be a complete, syntactically
/// valid JSON document; it is kept as text and never interpreted.
pub fn decode(line: &str) -> Result<Event, DecodeError> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(DecodeError::MalformedLine {
            fields: fields.len(),
        });
    }

    let timestamp = parse_timestamp(fields[0].trim())?;

    let raw_user = fields[1].trim();
    let user_id = raw_user
        .parse::<UserId>()
        .map_err(|e| DecodeError::InvalidUserId {
            value: raw_user.to_string(),
            reason: e.to_string(),
        })?;

    let event_type = fields[2].trim();
    if event_type.is_empty() {
        return Err(DecodeError::EmptyEventType);
    }

    let payload = fields[3].trim();
    validate_payload(payload)?;

    Ok(Event {
        timestamp,
        user_id,
        event_type: event_type.to_string(),
        payload: payload.to_string(),
    })
}

/// Encodes an [`Event`] into its canonical line (no trailing newline).
pub fn encode(event: &Event) -> String {
    event.to_string()
}

/// Checks JSON syntax without building a value.
fn validate_payload(payload: &str) -> Result<(), DecodeError> {
    serde_json::from_str::<IgnoredAny>(payload)
        .map(|_| ())
        .map_err(|e| DecodeError::InvalidPayload {
            reason: e.to_string(),
        })
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            format_timestamp(&self.timestamp),
            self.user_id,
            self.event_type,
            self.payload,
            sep = FIELD_SEPARATOR
        )
    }
}

impl FromStr for Event {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}
