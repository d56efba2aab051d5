//! HTTP validator dates.
//!
//! `Last-Modified` is stored as epoch millis in cache metadata and sent back
//! as an RFC 2822 GMT date in `If-Modified-Since`.

use chrono::{DateTime, TimeZone, Utc};

const EPOCH_RFC2822: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Formats epoch millis as `Thu, 01 Jan 1970 00:00:00 GMT`.
///
/// Out-of-range values fall back to the epoch.
pub fn to_rfc2822_gmt(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(date) => date.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => EPOCH_RFC2822.to_string(),
    }
}

/// Parses an RFC 2822 date into epoch millis.
pub fn parse_rfc2822(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_formatting() {
        assert_eq!(to_rfc2822_gmt(0), "Thu, 01 Jan 1970 00:00:00 GMT");
        assert_eq!(
            to_rfc2822_gmt(1_700_000_000_000),
            "Tue, 14 Nov 2023 22:13:20 GMT"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let formatted = to_rfc2822_gmt(1_700_000_000_000);
        assert_eq!(parse_rfc2822(&formatted), Some(1_700_000_000_000));
        assert_eq!(parse_rfc2822("yesterday"), None);
    }
}
