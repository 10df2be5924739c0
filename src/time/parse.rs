//! Parsing and formatting of the timestamp strings found in the input tables
//! and the persisted archive.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Format used when writing timestamps to any table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Parses a timestamp as naive local time.
///
/// Accepts `T` or a space between date and time, optional seconds and
/// fractional seconds, and an optional UTC offset. An offset is dropped, not
/// applied: `2024-05-01T10:00:00-05:00` parses to `2024-05-01 10:00:00`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.naive_local());
    }
    if let Ok(with_offset) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(with_offset.naive_local());
    }
    // A bare date is midnight.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Combines the separate `Date` and `Time` cells of the older daily log
/// format.
pub fn parse_date_and_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(time.trim(), format).ok())
        .map(|time| date.and_time(time))
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn parses_common_layouts() {
        assert_eq!(parse_timestamp("2024-05-01 10:15:30"), Some(at(10, 15, 30)));
        assert_eq!(parse_timestamp("2024-05-01T10:15:30"), Some(at(10, 15, 30)));
        assert_eq!(parse_timestamp("2024-05-01T10:15"), Some(at(10, 15, 0)));
        assert_eq!(parse_timestamp(" 2024-05-01 10:15 "), Some(at(10, 15, 0)));
        assert_eq!(parse_timestamp("2024-05-01"), Some(at(0, 0, 0)));
    }

    #[test]
    fn offset_is_dropped_not_applied() {
        assert_eq!(parse_timestamp("2024-05-01T10:15:30-05:00"), Some(at(10, 15, 30)));
        let fractional = parse_timestamp("2024-05-01T10:15:30.250+02:00").unwrap();
        assert_eq!(fractional.date(), at(0, 0, 0).date());
        assert_eq!(fractional.and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01 10:00:00"), None);
    }

    #[test]
    fn formatted_timestamps_parse_back() {
        let t = at(22, 0, 0);
        assert_eq!(format_timestamp(t), "2024-05-01 22:00:00");
        assert_eq!(parse_timestamp(&format_timestamp(t)), Some(t));
    }

    #[test]
    fn date_and_time_cells() {
        assert_eq!(parse_date_and_time("2024-05-01", "13:05"), Some(at(13, 5, 0)));
        assert_eq!(parse_date_and_time("2024-05-01", "13:05:09"), Some(at(13, 5, 9)));
        assert_eq!(parse_date_and_time("05/01/2024", "13:05"), None);
    }
}
