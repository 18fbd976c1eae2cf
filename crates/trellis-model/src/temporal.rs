//! Date and datetime parsing shared by inference and validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Default display format recorded on inferred date metas.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default display format recorded on inferred datetime metas.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a calendar date. Strings carrying a time component are rejected.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Parse a timestamp. A time component is required; RFC 3339 offsets are
/// normalized to UTC.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2020-01-01"),
            NaiveDate::from_ymd_opt(2020, 1, 1)
        );
        assert_eq!(
            parse_date("2020/02/29"),
            NaiveDate::from_ymd_opt(2020, 2, 29)
        );
        assert_eq!(parse_date("2021-02-29"), None);
        assert_eq!(parse_date("2020-01-01 10:00:00"), None);
        assert_eq!(parse_date("january"), None);
    }

    #[test]
    fn test_parse_datetime() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 1).and_then(|d| d.and_hms_opt(10, 30, 0));
        assert_eq!(parse_datetime("2020-01-01 10:30:00"), expected);
        assert_eq!(parse_datetime("2020-01-01T10:30:00"), expected);
        assert_eq!(parse_datetime("2020-01-01T10:30"), expected);
        assert_eq!(parse_datetime("2020-01-01T12:30:00+02:00"), expected);
        assert_eq!(parse_datetime("2020-01-01"), None);
    }
}
