//! The two-hour grid used as the join key between observations, the weather
//! archive and the sky-state log.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Maps a timestamp onto the two-hour grid.
///
/// Even hours are truncated to the top of the hour. Odd hours advance to the
/// next (even) hour. An odd hour of 23 rolls over to midnight of the following
/// day.
///
/// The asymmetry is what existing weather archives were keyed with, so the rule
/// must not be changed to plain nearest-hour rounding.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use solar_enrich::align_to_interval;
///
/// let t = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(13, 5, 0).unwrap();
/// let grid = align_to_interval(t);
/// assert_eq!(grid, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(14, 0, 0).unwrap());
/// assert_eq!(align_to_interval(grid), grid);
/// ```
pub fn align_to_interval(timestamp: NaiveDateTime) -> NaiveDateTime {
    let midnight = timestamp.date().and_time(NaiveTime::MIN);
    let top_of_hour = midnight + Duration::hours(timestamp.hour() as i64);
    if timestamp.hour() % 2 == 0 {
        top_of_hour
    } else {
        top_of_hour + Duration::hours(1)
    }
}

/// The calendar day a grid timestamp belongs to, which is the unit the remote
/// provider is queried with.
pub fn fetch_day(grid_timestamp: NaiveDateTime) -> NaiveDate {
    grid_timestamp.date()
}

/// `true` if `timestamp` is already a grid point.
pub fn is_aligned(timestamp: NaiveDateTime) -> bool {
    timestamp.hour() % 2 == 0
        && timestamp.minute() == 0
        && timestamp.second() == 0
        && timestamp.nanosecond() == 0
}
