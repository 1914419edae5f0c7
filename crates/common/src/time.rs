//! Timestamp parsing for event envelopes and payload dates.
//!
//! Producers emit two textual layouts: RFC 3339 with fractional seconds and
//! an offset (`2024-03-01T10:15:30.123456Z`), and the same layout with no
//! offset at all (`2024-03-01T10:15:30.123456`). Both are accepted; the
//! zone-less form is taken to be UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Layout of timestamps written without a timezone suffix.
const NAIVE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Neither accepted layout matched the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized timestamp: {input:?}")]
pub struct TimestampParseError {
    pub input: String,
}

/// Parses a timestamp in either accepted layout.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimestampParseError> {
    let trimmed = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, NAIVE_LAYOUT)
        .map(|naive| naive.and_utc())
        .map_err(|_| TimestampParseError {
            input: input.to_string(),
        })
}
