//! Output rows of the enrichment and combination stages.

use crate::types::observation::{LatLon, Observation};
use crate::types::weather_record::WeatherRecord;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// An observation joined with the weather record for its grid timestamp.
///
/// `weather` is `None` when no record exists for that grid point, typically
/// because the day's fetch failed. Such rows are still part of the output.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub observation: Observation,
    pub grid_timestamp: NaiveDateTime,
    pub weather: Option<WeatherRecord>,
}

impl EnrichedRow {
    pub fn weather_value(&self, field: &str) -> Option<f64> {
        self.weather.as_ref().and_then(|record| record.value(field))
    }
}

/// Location label used for rows without usable coordinates.
pub const MISSING_LOCATION: &str = "Missing";

/// A fully combined row: observation, weather, sky state and location name.
///
/// Serialised with the fixed column order `timestamp, location, measurement,
/// <weather fields...>, sky, filename, latitude, longitude`.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    /// The observation's own timestamp (not the grid timestamp).
    pub timestamp: NaiveDateTime,
    pub location: String,
    pub measurement: Option<f64>,
    pub weather: BTreeMap<String, f64>,
    pub sky: Option<String>,
    pub filename: String,
    pub coordinates: Option<LatLon>,
}

impl CombinedRow {
    pub fn weather_value(&self, field: &str) -> Option<f64> {
        self.weather.get(field).copied()
    }
}
