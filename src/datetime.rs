// Date and time parsing for DateTime fields

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// DateTime errors
#[derive(Error, Debug)]
pub enum DateTimeError {
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Parse an ISO 8601 timestamp.
///
/// Accepts a full RFC 3339 timestamp, a date-time without offset (read as
/// UTC) or a bare date (midnight UTC).
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, DateTimeError> {
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DateTimeError::ParseError(s.to_string()))
}

/// Format a timestamp as RFC 3339
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_iso8601("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_parse_without_offset() {
        let dt = parse_iso8601("2024-03-01T10:30:00").unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_date_only() {
        let dt = parse_iso8601("2024-03-01").unwrap();
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            parse_iso8601("yesterday"),
            Err(DateTimeError::ParseError(_))
        ));
    }

    #[test]
    fn test_format_roundtrip() {
        let dt = parse_iso8601("2024-03-01T10:30:00Z").unwrap();
        assert_eq!(parse_iso8601(&format_iso8601(&dt)).unwrap(), dt);
    }
}
