//! Time helpers for wire timestamps and result records.
//!
//! Wire messages carry millisecond Unix timestamps; result records carry
//! RFC 3339 strings with nanosecond precision, matching what the external
//! statistics collector parses.

use chrono::{DateTime, SecondsFormat, Utc};

/// Returns the current Unix time in milliseconds.
///
/// This is the `timestamp` value carried in requests and responses.
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Formats a datetime as RFC 3339 with nanosecond precision.
pub fn format_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unix_millis_is_recent() {
        // Sanity: after 2020-01-01 and below the year-3000 mark.
        let now = unix_millis();
        assert!(now > 1_577_836_800_000);
        assert!(now < 32_503_680_000_000);
    }

    #[test]
    fn rfc3339_format() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let s = format_rfc3339(dt);
        assert!(s.starts_with("2024-03-01T12:30:45."));
        assert!(s.ends_with('Z'));
    }

    #[test]
    fn rfc3339_is_sortable() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap();
        assert!(format_rfc3339(earlier) < format_rfc3339(later));
    }
}
