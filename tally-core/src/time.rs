//! Timestamp parsing shared by the store pipeline and the analyses.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse an RFC 3339 timestamp. Strings without an offset are accepted and
/// treated as UTC.
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    text.parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}
