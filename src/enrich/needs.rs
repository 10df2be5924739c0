//! Decides which calendar days must be bought from the remote provider.

use crate::archive::store::WeatherArchive;
use crate::time::interval::{align_to_interval, fetch_day};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;

/// Returns the days that need a remote fetch for the given observations.
///
/// Every timestamp is aligned to the two-hour grid. Each grid point with no
/// archive record contributes its calendar day. The provider is queried per
/// day, so one missing slot is enough to request the whole day again.
///
/// With an empty archive every distinct day among the observations is
/// returned.
pub fn determine_needs(
    observation_timestamps: impl IntoIterator<Item = NaiveDateTime>,
    archive: &WeatherArchive,
) -> BTreeSet<NaiveDate> {
    observation_timestamps
        .into_iter()
        .map(align_to_interval)
        .filter(|grid| !archive.covers(*grid))
        .map(fetch_day)
        .collect()
}

/// Formats days as the `YYYY-MM-DD` strings the provider expects.
pub fn day_strings(days: &BTreeSet<NaiveDate>) -> Vec<String> {
    days.iter()
        .map(|day| day.format("%Y-%m-%d").to_string())
        .collect()
}
