use crate::combine::cluster::LocationClusterer;
use crate::time::interval::align_to_interval;
use crate::types::location_label::LocationLabel;
use crate::types::rows::{CombinedRow, EnrichedRow, MISSING_LOCATION};
use crate::types::sky_state::SkyState;
use chrono::NaiveDateTime;
use log::{info, warn};
use std::collections::HashMap;

/// Columns that precede the weather fields in the combined table.
pub const LEADING_COLUMNS: [&str; 3] = ["timestamp", "location", "measurement"];
/// Columns that follow the weather fields in the combined table.
pub const TRAILING_COLUMNS: [&str; 4] = ["sky", "filename", "latitude", "longitude"];

/// Full, ordered column list of the combined table for the given weather
/// fields.
///
/// ```
/// use solar_enrich::output_columns;
///
/// let columns = output_columns(&["cloudcover".to_string(), "solarradiation".to_string()]);
/// assert_eq!(
///     columns,
///     ["timestamp", "location", "measurement", "cloudcover", "solarradiation",
///      "sky", "filename", "latitude", "longitude"]
/// );
/// ```
pub fn output_columns(weather_fields: &[String]) -> Vec<String> {
    LEADING_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .chain(weather_fields.iter().cloned())
        .chain(TRAILING_COLUMNS.iter().map(|column| column.to_string()))
        .collect()
}

/// Joins enriched rows with the sky-state log and names each row's location.
///
/// The sky join is a left join on grid timestamp: rows without a logged sky
/// keep `sky: None`. Every enriched row appears exactly once in the output, in
/// input order. If the log holds several entries for one grid timestamp, the
/// last one is used.
pub fn combine<C: LocationClusterer>(
    enriched: &[EnrichedRow],
    sky_states: &[SkyState],
    locations: &[LocationLabel],
    clusterer: &C,
) -> Vec<CombinedRow> {
    let mut sky_by_grid: HashMap<NaiveDateTime, &str> = HashMap::with_capacity(sky_states.len());
    for state in sky_states {
        let grid = align_to_interval(state.timestamp);
        if grid != state.timestamp {
            warn!(
                "Sky state at {} is not on the two-hour grid; using {}",
                state.timestamp, grid
            );
        }
        if let Some(previous) = sky_by_grid.insert(grid, state.sky.as_str()) {
            warn!(
                "Duplicate sky state at {} ('{}' replaced by '{}')",
                grid, previous, state.sky
            );
        }
    }

    let coordinates: Vec<_> = enriched
        .iter()
        .map(|row| row.observation.coordinates)
        .collect();
    let mut labels = clusterer.label(&coordinates, locations);
    if labels.len() != enriched.len() {
        warn!(
            "Clusterer returned {} labels for {} rows; unmatched rows are labelled '{}'",
            labels.len(),
            enriched.len(),
            MISSING_LOCATION
        );
        labels.resize(enriched.len(), MISSING_LOCATION.to_string());
    }

    let rows: Vec<CombinedRow> = enriched
        .iter()
        .zip(labels)
        .map(|(row, location)| CombinedRow {
            timestamp: row.observation.timestamp,
            location,
            measurement: row.observation.measurement,
            weather: row
                .weather
                .as_ref()
                .map(|record| record.values.clone())
                .unwrap_or_default(),
            sky: sky_by_grid
                .get(&row.grid_timestamp)
                .map(|sky| sky.to_string()),
            filename: row.observation.filename.clone(),
            coordinates: row.observation.coordinates,
        })
        .collect();

    info!(
        "Combined {} rows ({} with sky state)",
        rows.len(),
        rows.iter().filter(|row| row.sky.is_some()).count()
    );
    rows
}
