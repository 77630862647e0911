// ============================================
// File: crates/tidelink-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Readings, batches and shutdown notices are all stamped with UTC
//! wall-clock time and exchanged as ISO-8601 text.
//!
//! ## Main Functionality
//! - [`now_utc`]: Current UTC timestamp
//! - [`parse_timestamp`]: Lenient RFC 3339 parsing, normalised to UTC
//! - [`format_timestamp`]: Canonical RFC 3339 rendering
//!
//! ## ⚠️ Important Note for Next Developer
//! - Edge nodes may send local offsets (`+01:00`); always normalise
//! - Output uses `Z` with the shortest exact sub-second precision
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CommonError;

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Parses an RFC 3339 / ISO-8601 timestamp with any offset into UTC.
///
/// # Errors
/// Returns `InvalidTimestamp` if the text is not a valid timestamp.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CommonError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CommonError::InvalidTimestamp {
            value: value.to_string(),
            details: e.to_string(),
        })
}

/// Formats a timestamp as RFC 3339 with a `Z` suffix.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises_offset() {
        let ts = parse_timestamp("2024-01-01T01:00:00+01:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_parse_keeps_fraction() {
        let ts = parse_timestamp("2024-01-01T00:00:00.1234567Z").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01T00:00:00.123456700Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
