//! Timestamp normalization.
//!
//! The provider reports history timestamps offset from UTC. History reads
//! shift them by a fixed adjustment and re-emit proper UTC ISO strings.
//! Any value that does not parse is passed through unchanged.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::models::Position;

/// Hours added to provider timestamps to reach UTC.
const UTC_ADJUSTMENT_HOURS: i64 = 3;

/// Shifts a provider timestamp by the fixed adjustment and returns it as a
/// UTC ISO-8601 string. Unparseable input comes back untouched.
pub fn normalize_timestamp_to_utc(timestamp: &str) -> String {
    if timestamp.is_empty() {
        return timestamp.to_string();
    }
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => {
            let adjusted = parsed.with_timezone(&Utc) + Duration::hours(UTC_ADJUSTMENT_HOURS);
            adjusted.to_rfc3339_opts(SecondsFormat::Millis, true)
        }
        Err(_) => timestamp.to_string(),
    }
}

/// Normalizes every timestamp field of a position in place.
pub fn normalize_position_timestamps(position: &mut Position) {
    if let Some(device_time) = &position.device_time {
        position.device_time = Some(normalize_timestamp_to_utc(device_time));
    }
    if let Some(fix_time) = &position.fix_time {
        position.fix_time = Some(normalize_timestamp_to_utc(fix_time));
    }
    if let Some(server_time) = &position.server_time {
        position.server_time = Some(normalize_timestamp_to_utc(server_time));
    }
}
