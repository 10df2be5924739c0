//! Loaders for the hand-made input tables: observations, sky states and
//! reference locations.

use crate::tables::error::TableError;
use crate::tables::frame::{column_names, read_text_csv, text_cells};
use crate::time::parse::{parse_date_and_time, parse_timestamp};
use crate::types::location_label::LocationLabel;
use crate::types::observation::{LatLon, Observation};
use crate::types::sky_state::SkyState;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use polars::prelude::DataFrame;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// Column names used by the extractor over time, newest first.
const FILENAME_COLUMNS: [&str; 2] = ["filename", "File"];
const MEASUREMENT_COLUMNS: [&str; 2] = ["measurement", "SolarIrradiance"];
const LATITUDE_COLUMNS: [&str; 2] = ["latitude", "Latitude"];
const LONGITUDE_COLUMNS: [&str; 2] = ["longitude", "Longitude"];
const TIMESTAMP_COLUMNS: [&str; 2] = ["timestamp", "Timestamp"];
const DATE_COLUMN: &str = "Date";
const TIME_COLUMN: &str = "Time";

const UNKNOWN_MEASUREMENT: &str = "unknown";

/// A CSV table read as text, with the path kept for error messages.
struct TextTable {
    path: PathBuf,
    df: DataFrame,
    names: Vec<String>,
}

impl TextTable {
    fn read(path: &Path) -> Result<Self, TableError> {
        let df = read_text_csv(path).map_err(|e| TableError::Unreadable(path.to_path_buf(), e))?;
        let names = column_names(&df);
        debug!("Read {} rows with columns {:?} from {:?}", df.height(), names, path);
        Ok(Self {
            path: path.to_path_buf(),
            df,
            names,
        })
    }

    fn find<'a>(&self, aliases: &[&'a str]) -> Option<&'a str> {
        aliases
            .iter()
            .find(|alias| self.names.iter().any(|name| name == *alias))
            .copied()
    }

    fn column(&self, aliases: &[&str]) -> Result<(String, Vec<Option<String>>), TableError> {
        let name = self.find(aliases).ok_or_else(|| TableError::MissingColumn {
            path: self.path.clone(),
            column: aliases.join("/"),
        })?;
        let cells = text_cells(&self.df, name)
            .map_err(|e| TableError::Unreadable(self.path.clone(), e))?;
        Ok((name.to_string(), cells))
    }

    fn bad_cell(&self, row: usize, column: &str, value: Option<&str>) -> TableError {
        TableError::BadCell {
            path: self.path.clone(),
            row,
            column: column.to_string(),
            value: value.unwrap_or_default().to_string(),
        }
    }

    /// One timestamp per row, from a `timestamp` column or from separate
    /// `Date` and `Time` columns.
    fn timestamps(&self) -> Result<Vec<NaiveDateTime>, TableError> {
        if let Some(name) = self.find(&TIMESTAMP_COLUMNS) {
            let (name, cells) = self.column(&[name])?;
            return cells
                .iter()
                .enumerate()
                .map(|(row, cell)| {
                    cell.as_deref()
                        .and_then(parse_timestamp)
                        .ok_or_else(|| self.bad_cell(row, &name, cell.as_deref()))
                })
                .collect();
        }

        let (_, dates) = self.column(&[DATE_COLUMN]).map_err(|_| TableError::MissingColumn {
            path: self.path.clone(),
            column: format!("timestamp or {DATE_COLUMN}+{TIME_COLUMN}"),
        })?;
        let (_, times) = self.column(&[TIME_COLUMN])?;
        dates
            .iter()
            .zip(&times)
            .enumerate()
            .map(|(row, (date, time))| match (date.as_deref(), time.as_deref()) {
                (Some(date), Some(time)) => parse_date_and_time(date, time).ok_or_else(|| {
                    self.bad_cell(row, DATE_COLUMN, Some(format!("{date} {time}").as_str()))
                }),
                (None, _) => Err(self.bad_cell(row, DATE_COLUMN, None)),
                (Some(_), None) => Err(self.bad_cell(row, TIME_COLUMN, None)),
            })
            .collect()
    }

    /// Parses a finite number. `NaN` and infinities are rejected.
    fn number(&self, row: usize, column: &str, cell: Option<&str>) -> Result<Option<f64>, TableError> {
        cell.map(|raw| {
            raw.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| self.bad_cell(row, column, Some(raw)))
        })
        .transpose()
    }
}

/// Loads the observation table written by the screenshot extractor.
///
/// Both the current column names and the older `File`, `SolarIrradiance`,
/// `Latitude`, `Longitude`, `Date`, `Time` layout are accepted. A measurement
/// of `unknown` or an empty cell is absent. Coordinates are absent when either
/// cell is empty or the pair is a "not detected" sentinel such as `0,0`.
/// File names identify screenshots; a repeated file name is skipped with a
/// warning and the first row is kept.
pub fn load_observations(path: &Path) -> Result<Vec<Observation>, TableError> {
    let table = TextTable::read(path)?;
    let (filename_column, filenames) = table.column(&FILENAME_COLUMNS)?;
    let (measurement_column, measurements) = table.column(&MEASUREMENT_COLUMNS)?;
    let (latitude_column, latitudes) = table.column(&LATITUDE_COLUMNS)?;
    let (longitude_column, longitudes) = table.column(&LONGITUDE_COLUMNS)?;
    let timestamps = table.timestamps()?;

    let mut observations = Vec::with_capacity(timestamps.len());
    let mut seen = HashSet::with_capacity(timestamps.len());
    for (row, timestamp) in timestamps.into_iter().enumerate() {
        let filename = filenames[row]
            .clone()
            .ok_or_else(|| table.bad_cell(row, &filename_column, None))?;
        if !seen.insert(filename.clone()) {
            warn!(
                "Observation table {:?} row {} repeats file '{}', skipped",
                path, row, filename
            );
            continue;
        }

        let measurement = match measurements[row].as_deref() {
            Some(raw) if raw.eq_ignore_ascii_case(UNKNOWN_MEASUREMENT) => None,
            cell => table.number(row, &measurement_column, cell)?,
        };
        let latitude = table.number(row, &latitude_column, latitudes[row].as_deref())?;
        let longitude = table.number(row, &longitude_column, longitudes[row].as_deref())?;
        let coordinates = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => LatLon::from_raw(latitude, longitude),
            _ => None,
        };

        observations.push(Observation {
            filename,
            timestamp,
            measurement,
            coordinates,
        });
    }

    let unlocated = observations
        .iter()
        .filter(|observation| observation.coordinates.is_none())
        .count();
    info!(
        "Loaded {} observations from {:?} ({} without coordinates)",
        observations.len(),
        path,
        unlocated
    );
    Ok(observations)
}

/// Loads the hand-kept sky log (`timestamp`, `sky`). Rows with an empty sky
/// cell are skipped.
pub fn load_sky_states(path: &Path) -> Result<Vec<SkyState>, TableError> {
    let table = TextTable::read(path)?;
    let timestamps = table.timestamps()?;
    let (_, skies) = table.column(&["sky"])?;

    let mut states = Vec::with_capacity(timestamps.len());
    for (row, (timestamp, sky)) in timestamps.into_iter().zip(skies).enumerate() {
        match sky {
            Some(sky) => states.push(SkyState { timestamp, sky }),
            None => warn!("Sky log {:?} row {} has no sky value, skipped", path, row),
        }
    }
    info!("Loaded {} sky states from {:?}", states.len(), path);
    Ok(states)
}

/// Loads the reference site table (`name`, `latitude`, `longitude`).
pub fn load_location_labels(path: &Path) -> Result<Vec<LocationLabel>, TableError> {
    let table = TextTable::read(path)?;
    let (name_column, names) = table.column(&["name"])?;
    let (latitude_column, latitudes) = table.column(&LATITUDE_COLUMNS)?;
    let (longitude_column, longitudes) = table.column(&LONGITUDE_COLUMNS)?;

    let mut labels = Vec::with_capacity(names.len());
    for row in 0..names.len() {
        let name = names[row]
            .clone()
            .ok_or_else(|| table.bad_cell(row, &name_column, None))?;
        let latitude = table
            .number(row, &latitude_column, latitudes[row].as_deref())?
            .ok_or_else(|| table.bad_cell(row, &latitude_column, None))?;
        let longitude = table
            .number(row, &longitude_column, longitudes[row].as_deref())?
            .ok_or_else(|| table.bad_cell(row, &longitude_column, None))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(table.bad_cell(row, &latitude_column, latitudes[row].as_deref()));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(table.bad_cell(row, &longitude_column, longitudes[row].as_deref()));
        }
        labels.push(LocationLabel::new(name, LatLon(latitude, longitude)));
    }
    info!("Loaded {} reference locations from {:?}", labels.len(), path);
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_current_observation_layout() -> Result<(), TableError> {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "observations.csv",
            "filename,timestamp,measurement,latitude,longitude\n\
             a.png,2024-01-01 13:05:00,512.5,41.603,-87.337\n\
             b.png,2024-01-01T13:50,unknown,0,0\n\
             c.png,2024-01-02 09:00:00,,,\n",
        );

        let observations = load_observations(&path)?;
        assert_eq!(observations.len(), 3);
        assert_eq!(
            observations[0],
            Observation::new("a.png", at(1, 13, 5))
                .with_measurement(512.5)
                .with_coordinates(LatLon(41.603, -87.337))
        );
        assert_eq!(observations[1].timestamp, at(1, 13, 50));
        assert_eq!(observations[1].measurement, None);
        assert_eq!(observations[1].coordinates, None);
        assert_eq!(observations[2], Observation::new("c.png", at(2, 9, 0)));
        Ok(())
    }

    #[test]
    fn loads_legacy_observation_layout() -> Result<(), TableError> {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "results.csv",
            ",File,Date,Time,SolarIrradiance,Latitude,Longitude\n\
             0,IMG_1.png,2024-01-01,13:05,87,-1,-87.3\n\
             1,IMG_2.png,2024-01-02,09:00:00,Unknown,41.6,-87.3\n",
        );

        let observations = load_observations(&path)?;
        assert_eq!(observations[0].filename, "IMG_1.png");
        assert_eq!(observations[0].timestamp, at(1, 13, 5));
        assert_eq!(observations[0].measurement, Some(87.0));
        assert_eq!(observations[0].coordinates, None);
        assert_eq!(observations[1].measurement, None);
        assert_eq!(observations[1].coordinates, Some(LatLon(41.6, -87.3)));
        Ok(())
    }

    #[test]
    fn observation_errors_name_the_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "observations.csv",
            "filename,timestamp,measurement,latitude,longitude\n\
             a.png,2024-01-01 13:05:00,bright,41.6,-87.3\n",
        );
        let error = load_observations(&path).unwrap_err();
        assert!(
            matches!(&error, TableError::BadCell { row: 0, column, .. } if column == "measurement"),
            "{error:?}"
        );

        let path = write(&dir, "no_time.csv", "filename,measurement,latitude,longitude\na,1,2,3\n");
        assert!(matches!(
            load_observations(&path).unwrap_err(),
            TableError::MissingColumn { .. }
        ));
    }

    #[test]
    fn loads_sky_log_and_skips_blank_entries() -> Result<(), TableError> {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "sky.csv",
            "timestamp,sky\n2024-01-01 14:00:00,clear\n2024-01-01 16:00:00,\n2024-01-02 10:00:00,overcast\n",
        );
        let states = load_sky_states(&path)?;
        assert_eq!(
            states,
            [
                SkyState {
                    timestamp: at(1, 14, 0),
                    sky: "clear".to_string()
                },
                SkyState {
                    timestamp: at(2, 10, 0),
                    sky: "overcast".to_string()
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn loads_reference_locations() -> Result<(), TableError> {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "locations.csv",
            "name,latitude,longitude\nLakefront,41.603,-87.337\nCampus,41.58,-87.475\n",
        );
        let labels = load_location_labels(&path)?;
        assert_eq!(
            labels,
            [
                LocationLabel::new("Lakefront", LatLon(41.603, -87.337)),
                LocationLabel::new("Campus", LatLon(41.58, -87.475)),
            ]
        );

        let path = write(&dir, "broken.csv", "name,latitude,longitude\nNowhere,,-87.3\n");
        assert!(matches!(
            load_location_labels(&path).unwrap_err(),
            TableError::BadCell { .. }
        ));
        Ok(())
    }

    #[test]
    fn non_finite_and_out_of_range_sites_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents, bad_column) in [
            ("nan.csv", "name,latitude,longitude\nA,NaN,-87.3\n", "latitude"),
            ("inf.csv", "name,latitude,longitude\nA,41.6,inf\n", "longitude"),
            ("range.csv", "name,latitude,longitude\nA,91,-87.3\n", "latitude"),
        ] {
            let path = write(&dir, name, contents);
            let error = load_location_labels(&path).unwrap_err();
            assert!(
                matches!(&error, TableError::BadCell { row: 0, column, .. } if column == bad_column),
                "{name}: {error:?}"
            );
        }
    }

    #[test]
    fn non_finite_measurement_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "observations.csv",
            "filename,timestamp,measurement,latitude,longitude\n\
             a.png,2024-01-01 13:05:00,NaN,41.6,-87.3\n",
        );
        let error = load_observations(&path).unwrap_err();
        assert!(
            matches!(&error, TableError::BadCell { column, .. } if column == "measurement"),
            "{error:?}"
        );
    }

    #[test]
    fn repeated_file_names_keep_the_first_row() -> Result<(), TableError> {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "observations.csv",
            "filename,timestamp,measurement,latitude,longitude\n\
             a.png,2024-01-01 13:05:00,500,41.6,-87.3\n\
             b.png,2024-01-01 13:50:00,480,41.6,-87.3\n\
             a.png,2024-01-02 09:00:00,10,41.6,-87.3\n",
        );
        let observations = load_observations(&path)?;
        let names: Vec<_> = observations.iter().map(|o| o.filename.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png"]);
        assert_eq!(observations[0].measurement, Some(500.0));
        Ok(())
    }
}
