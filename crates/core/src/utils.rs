//! Shared utility functions used across multiple crates.

use chrono::{NaiveDate, NaiveDateTime};

// ── Date Parsing ────────────────────────────────────────────────────

/// Parse a date string in `YYYY-MM-DD` format.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a date in compact `YYYYMMDD` format.
pub fn parse_date_compact(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

/// Parse a date in either `YYYY-MM-DD` or `YYYYMMDD` format.
pub fn parse_date_any(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    parse_date(s).or_else(|| parse_date_compact(s))
}

/// Parse a bar timestamp. Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
/// or a bare date (midnight).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| parse_date_any(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("bad").is_none());
    }

    #[test]
    fn test_parse_date_compact() {
        let d = parse_date_compact("20240115").unwrap();
        assert_eq!(d.to_string(), "2024-01-15");
    }

    #[test]
    fn test_parse_datetime_formats() {
        let full = parse_datetime("2024-01-15 15:00:00").unwrap();
        assert_eq!(full.to_string(), "2024-01-15 15:00:00");
        let iso = parse_datetime("2024-01-15T09:30:00").unwrap();
        assert_eq!(iso.to_string(), "2024-01-15 09:30:00");
        let day = parse_datetime("20240115").unwrap();
        assert_eq!(day.to_string(), "2024-01-15 00:00:00");
        assert!(parse_datetime("15/01/2024").is_none());
    }
}
