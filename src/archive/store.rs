//! The local weather archive: every hourly record already bought from the
//! remote provider, keyed by timestamp.
//!
//! The archive is a plain value. Operations that grow it take `&mut self`, and
//! callers decide when to [`persist`](WeatherArchive::persist) it. Persisting
//! after each appended batch keeps a crash from losing records that were
//! already paid for.

use crate::archive::error::ArchiveError;
use crate::tables::frame::{
    column_names, format_number, is_index_column, read_text_csv, text_cells, text_frame,
    write_csv,
};
use crate::time::interval::{align_to_interval, fetch_day};
use crate::time::parse::{format_timestamp, parse_timestamp};
use crate::types::weather_record::WeatherRecord;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tempfile::NamedTempFile;

/// Name of the mandatory key column in the persisted archive.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Ordered, duplicate-free collection of weather records.
///
/// At most one record exists per timestamp; appending a record for a
/// timestamp that is already present replaces the old one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherArchive {
    /// Weather columns, in persisted order.
    fields: Vec<String>,
    records: BTreeMap<NaiveDateTime, WeatherRecord>,
}

impl WeatherArchive {
    /// Creates an empty archive that will persist the given weather columns.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            records: BTreeMap::new(),
        }
    }

    /// Loads the archive from `path`.
    ///
    /// A missing file is the cold-cache case and yields an empty archive.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Unreadable`] if the file is not a readable CSV
    /// table, and [`ArchiveError::CorruptArchive`] if the path is not a regular
    /// file, the `timestamp` column is missing, or a timestamp or value cell
    /// cannot be parsed. Loading never
    /// modifies the file.
    ///
    /// Both variants mean the archive cannot serve as a cache. Callers that do
    /// not care which one occurred should test [`ArchiveError::is_corrupt`]
    /// rather than match on `CorruptArchive` alone.
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        if !path.exists() {
            info!(
                "No weather archive at {:?}, starting with an empty one",
                path
            );
            return Ok(Self::default());
        }

        let corrupt = |reason: String| ArchiveError::CorruptArchive {
            path: path.to_path_buf(),
            reason,
        };
        if !path.is_file() {
            return Err(corrupt("not a regular file".to_string()));
        }
        let df = read_text_csv(path).map_err(|e| ArchiveError::Unreadable(path.to_path_buf(), e))?;

        let names = column_names(&df);
        if !names.iter().any(|name| name == TIMESTAMP_COLUMN) {
            return Err(corrupt(format!(
                "missing mandatory '{TIMESTAMP_COLUMN}' column (found {names:?})"
            )));
        }
        let fields: Vec<String> = names
            .into_iter()
            .filter(|name| name != TIMESTAMP_COLUMN && !is_index_column(name))
            .collect();

        let read_column = |name: &str| {
            text_cells(&df, name).map_err(|e| ArchiveError::Unreadable(path.to_path_buf(), e))
        };
        let timestamps = read_column(TIMESTAMP_COLUMN)?;
        let columns = fields
            .iter()
            .map(|field| read_column(field))
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(timestamps.len());
        for (row, raw_timestamp) in timestamps.iter().enumerate() {
            let raw_timestamp = raw_timestamp
                .as_deref()
                .ok_or_else(|| corrupt(format!("row {row}: empty timestamp")))?;
            let timestamp = parse_timestamp(raw_timestamp).ok_or_else(|| {
                corrupt(format!("row {row}: unparsable timestamp '{raw_timestamp}'"))
            })?;

            let mut record = WeatherRecord::new(timestamp);
            for (field, cells) in fields.iter().zip(&columns) {
                let Some(raw_value) = cells[row].as_deref() else {
                    continue;
                };
                let value = raw_value.parse::<f64>().map_err(|_| {
                    corrupt(format!(
                        "row {row}: value '{raw_value}' in column '{field}' is not a number"
                    ))
                })?;
                record.values.insert(field.clone(), value);
            }
            records.push(record);
        }

        let mut archive = Self::new(fields);
        let loaded = records.len();
        archive.append(records);
        if archive.len() < loaded {
            warn!(
                "Weather archive {:?} contained {} duplicate timestamps; kept the last of each",
                path,
                loaded - archive.len()
            );
        }
        info!(
            "Loaded {} weather records ({} fields) from {:?}",
            archive.len(),
            archive.fields.len(),
            path
        );
        Ok(archive)
    }

    /// Writes the whole archive to `path`.
    ///
    /// The table is written to a temporary file next to `path` and then moved
    /// over it, so an interrupted write leaves the previous archive intact.
    pub fn persist(&self, path: &Path) -> Result<(), ArchiveError> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        std::fs::create_dir_all(&directory)
            .map_err(|e| ArchiveError::DirCreation(directory.clone(), e))?;

        let mut columns = Vec::with_capacity(self.fields.len() + 1);
        columns.push((
            TIMESTAMP_COLUMN.to_string(),
            self.records
                .keys()
                .map(|timestamp| Some(format_timestamp(*timestamp)))
                .collect(),
        ));
        for field in &self.fields {
            columns.push((
                field.clone(),
                self.records
                    .values()
                    .map(|record| record.value(field).map(format_number))
                    .collect(),
            ));
        }
        let mut df =
            text_frame(columns).map_err(|e| ArchiveError::WritePolars(path.to_path_buf(), e))?;

        let mut temp_file = NamedTempFile::new_in(&directory)
            .map_err(|e| ArchiveError::WriteIo(path.to_path_buf(), e))?;
        write_csv(temp_file.as_file_mut(), &mut df)
            .map_err(|e| ArchiveError::WritePolars(path.to_path_buf(), e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ArchiveError::WriteIo(path.to_path_buf(), e))?;
        temp_file
            .persist(path)
            .map_err(|e| ArchiveError::Persist(path.to_path_buf(), e))?;

        debug!("Persisted {} weather records to {:?}", self.len(), path);
        Ok(())
    }

    /// Merges `records` into the archive, returning how many timestamps were
    /// not present before.
    ///
    /// Duplicates, both within `records` and against existing entries, are
    /// resolved last-write-wins. Weather fields not yet tracked are added as
    /// new columns.
    pub fn append(&mut self, records: impl IntoIterator<Item = WeatherRecord>) -> usize {
        let mut added = 0;
        for record in records {
            for field in record.values.keys() {
                if !self.fields.contains(field) {
                    debug!("Weather archive gained new column '{}'", field);
                    self.fields.push(field.clone());
                }
            }
            if self.records.insert(record.timestamp, record).is_none() {
                added += 1;
            }
        }
        added
    }

    /// `true` iff a record exists for exactly this grid timestamp.
    pub fn covers(&self, grid_timestamp: NaiveDateTime) -> bool {
        self.records.contains_key(&grid_timestamp)
    }

    pub fn get(&self, grid_timestamp: NaiveDateTime) -> Option<&WeatherRecord> {
        self.records.get(&grid_timestamp)
    }

    /// Days for which every aligned observation timestamp already has a record.
    ///
    /// A day with even one uncovered observation slot is not in the result.
    pub fn covered_days(
        &self,
        observation_timestamps: impl IntoIterator<Item = NaiveDateTime>,
    ) -> BTreeSet<NaiveDate> {
        let mut days: BTreeMap<NaiveDate, bool> = BTreeMap::new();
        for timestamp in observation_timestamps {
            let grid = align_to_interval(timestamp);
            let covered = days.entry(fetch_day(grid)).or_insert(true);
            *covered &= self.covers(grid);
        }
        days.into_iter()
            .filter_map(|(day, covered)| covered.then_some(day))
            .collect()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn records(&self) -> impl Iterator<Item = &WeatherRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sample_archive() -> WeatherArchive {
        let mut archive = WeatherArchive::new(["cloudcover", "solarradiation"]);
        archive.append([
            WeatherRecord::new(at(1, 12))
                .with_value("cloudcover", 37.5)
                .with_value("solarradiation", 412.0),
            WeatherRecord::new(at(1, 14)).with_value("cloudcover", 0.1 + 0.2),
            WeatherRecord::new(at(2, 10))
                .with_value("cloudcover", 100.0)
                .with_value("solarradiation", 3.25e-3),
        ]);
        archive
    }

    #[test]
    fn missing_file_is_an_empty_archive() -> Result<(), ArchiveError> {
        let dir = tempfile::tempdir().unwrap();
        let archive = WeatherArchive::load(&dir.path().join("nope.csv"))?;
        assert!(archive.is_empty());
        Ok(())
    }

    #[test]
    fn persist_then_load_round_trips() -> Result<(), ArchiveError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("api_archive.csv");
        let archive = sample_archive();

        archive.persist(&path)?;
        let reloaded = WeatherArchive::load(&path)?;
        assert_eq!(reloaded, archive);

        // A second cycle must not drift either.
        reloaded.persist(&path)?;
        assert_eq!(WeatherArchive::load(&path)?, archive);
        Ok(())
    }

    #[test]
    fn append_deduplicates_last_write_wins() {
        let mut archive = sample_archive();
        let added = archive.append([
            WeatherRecord::new(at(1, 12)).with_value("cloudcover", 5.0),
            WeatherRecord::new(at(3, 8)).with_value("cloudcover", 1.0),
            WeatherRecord::new(at(3, 8)).with_value("cloudcover", 2.0),
        ]);
        assert_eq!(added, 1);
        assert_eq!(archive.len(), 4);
        assert_eq!(archive.get(at(1, 12)).unwrap().value("cloudcover"), Some(5.0));
        assert_eq!(archive.get(at(3, 8)).unwrap().value("cloudcover"), Some(2.0));
    }

    #[test]
    fn append_tracks_new_fields() {
        let mut archive = WeatherArchive::new(["cloudcover"]);
        archive.append([WeatherRecord::new(at(1, 0)).with_value("uvindex", 4.0)]);
        assert_eq!(archive.fields(), ["cloudcover", "uvindex"]);
    }

    #[test]
    fn loads_pandas_layout_and_dedups() -> Result<(), ArchiveError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_archive.csv");
        fs::write(
            &path,
            ",timestamp,cloudcover,solarradiation\n\
             0,2024-01-01 12:00:00,37.5,412.0\n\
             1,2024-01-01T14:00:00,,\n\
             2,2024-01-01 12:00:00,40.0,400.0\n",
        )
        .unwrap();

        let archive = WeatherArchive::load(&path)?;
        assert_eq!(archive.fields(), ["cloudcover", "solarradiation"]);
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.get(at(1, 12)).unwrap().value("cloudcover"), Some(40.0));
        assert!(archive.covers(at(1, 14)));
        assert_eq!(archive.get(at(1, 14)).unwrap().value("cloudcover"), None);
        Ok(())
    }

    #[test]
    fn missing_timestamp_column_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_archive.csv");
        let original = "Date Time,cloudcover\n2024-01-01 12:00:00,3\n";
        fs::write(&path, original).unwrap();

        let error = WeatherArchive::load(&path).unwrap_err();
        assert!(matches!(error, ArchiveError::CorruptArchive { .. }), "{error:?}");
        assert!(error.is_corrupt());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn bad_cells_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_archive.csv");

        fs::write(&path, "timestamp,cloudcover\nnot a time,3\n").unwrap();
        assert!(WeatherArchive::load(&path).unwrap_err().is_corrupt());

        fs::write(&path, "timestamp,cloudcover\n2024-01-01 12:00:00,cloudy\n").unwrap();
        assert!(WeatherArchive::load(&path).unwrap_err().is_corrupt());
    }

    #[test]
    fn unreadable_archive_counts_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_archive.csv");
        fs::create_dir(&path).unwrap();

        let error = WeatherArchive::load(&path).unwrap_err();
        assert!(matches!(error, ArchiveError::CorruptArchive { .. }), "{error:?}");
        assert!(error.is_corrupt());
        assert!(path.is_dir());
    }

    #[test]
    fn covered_days_requires_every_slot() {
        let archive = sample_archive();
        let observations = [
            at(1, 11) + chrono::Duration::minutes(20), // -> 1st 12:00, covered
            at(1, 13) + chrono::Duration::minutes(5),  // -> 1st 14:00, covered
            at(2, 9),                                  // -> 2nd 10:00, covered
            at(2, 15),                                 // -> 2nd 16:00, missing
        ];
        let days = archive.covered_days(observations);
        assert_eq!(days, BTreeSet::from([at(1, 0).date()]));
    }
}
