//! Joins observations to hourly weather, buying missing days from the remote
//! provider and folding them into the archive as they arrive.

use crate::archive::error::ArchiveError;
use crate::archive::store::WeatherArchive;
use crate::enrich::error::EnrichError;
use crate::enrich::needs::determine_needs;
use crate::fetch::error::FetchError;
use crate::fetch::source::WeatherSource;
use crate::time::interval::align_to_interval;
use crate::types::observation::Observation;
use crate::types::rows::EnrichedRow;
use chrono::{NaiveDate, NaiveDateTime};
use futures_util::{stream, StreamExt};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

const DEFAULT_CONCURRENCY: usize = 4;

/// A recoverable problem met during enrichment. The run carried on without
/// the affected day or write.
#[derive(Debug)]
pub enum EnrichFailure {
    /// The provider could not deliver this day. Observations on it have no
    /// weather.
    Fetch { day: NaiveDate, error: FetchError },
    /// The archive could not be written after a fetch. The fetched records are
    /// still used for this run but will be bought again next time.
    Persist(ArchiveError),
}

/// Result of one enrichment run.
#[derive(Debug)]
pub struct Enrichment {
    /// One row per input observation, in input order.
    pub rows: Vec<EnrichedRow>,
    /// The archive including every record fetched during the run.
    pub archive: WeatherArchive,
    /// Days that were fetched successfully.
    pub fetched_days: Vec<NaiveDate>,
    pub failures: Vec<EnrichFailure>,
}

impl Enrichment {
    pub fn failed_days(&self) -> Vec<NaiveDate> {
        self.failures
            .iter()
            .filter_map(|failure| match failure {
                EnrichFailure::Fetch { day, .. } => Some(*day),
                EnrichFailure::Persist(_) => None,
            })
            .collect()
    }
}

/// Enrichment merge engine.
///
/// Holds the weather source and, optionally, the path the archive is persisted
/// to after every successful day.
pub struct Enricher<S> {
    source: S,
    archive_path: Option<PathBuf>,
    concurrency: usize,
}

impl<S: WeatherSource> Enricher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            archive_path: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Persist the archive to `path` after each fetched day.
    pub fn with_archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    /// Maximum number of days fetched at the same time. At least one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Joins every observation to the archive record at its grid timestamp,
    /// fetching the days the archive does not cover yet.
    ///
    /// The returned rows match `observations` one to one. An observation whose
    /// day could not be fetched keeps `weather: None` and the failure is
    /// listed in [`Enrichment::failures`]. Covered observations are enriched
    /// regardless of how fetching goes.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::JoinIntegrity`] only if an observation that was
    /// classified as covered does not find its record, which indicates a bug.
    pub async fn enrich(
        &self,
        observations: &[Observation],
        mut archive: WeatherArchive,
    ) -> Result<Enrichment, EnrichError> {
        let grids: Vec<NaiveDateTime> = observations
            .iter()
            .map(|observation| align_to_interval(observation.timestamp))
            .collect();
        let (covered, uncovered): (Vec<usize>, Vec<usize>) =
            (0..observations.len()).partition(|&i| archive.covers(grids[i]));
        info!(
            "{} of {} observations already covered by the weather archive",
            covered.len(),
            observations.len()
        );

        let mut rows: Vec<Option<EnrichedRow>> = vec![None; observations.len()];
        for &i in &covered {
            let record = archive
                .get(grids[i])
                .ok_or_else(|| EnrichError::JoinIntegrity {
                    filename: observations[i].filename.clone(),
                    grid_timestamp: grids[i],
                })?;
            rows[i] = Some(EnrichedRow {
                observation: observations[i].clone(),
                grid_timestamp: grids[i],
                weather: Some(record.clone()),
            });
        }

        let days = determine_needs(
            uncovered.iter().map(|&i| observations[i].timestamp),
            &archive,
        );
        let mut fetched_days = Vec::new();
        let mut failures = Vec::new();
        if !days.is_empty() {
            info!("Fetching weather for {} day(s): {:?}", days.len(), days);
            let source = &self.source;
            let mut fetches = stream::iter(days)
                .map(|day| async move { (day, source.fetch_day(day).await) })
                .buffer_unordered(self.concurrency);

            while let Some((day, result)) = fetches.next().await {
                match result {
                    Ok(records) => {
                        let added = archive.append(records);
                        info!("Archived {} new hourly records for {}", added, day);
                        fetched_days.push(day);
                        if let Err(e) = self.persist(&archive) {
                            error!("Could not persist weather archive after {}: {}", day, e);
                            failures.push(EnrichFailure::Persist(e));
                        }
                    }
                    Err(e) => {
                        warn!("Weather for {} unavailable: {}", day, e);
                        failures.push(EnrichFailure::Fetch { day, error: e });
                    }
                }
            }
            fetched_days.sort();
        }

        for &i in &uncovered {
            let weather = archive.get(grids[i]).cloned();
            if weather.is_none() {
                warn!(
                    "No weather for '{}' at {}; keeping the row without weather",
                    observations[i].filename, grids[i]
                );
            }
            rows[i] = Some(EnrichedRow {
                observation: observations[i].clone(),
                grid_timestamp: grids[i],
                weather,
            });
        }

        Ok(Enrichment {
            rows: rows.into_iter().flatten().collect(),
            archive,
            fetched_days,
            failures,
        })
    }

    fn persist(&self, archive: &WeatherArchive) -> Result<(), ArchiveError> {
        match self.archive_path.as_deref() {
            Some(path) => archive.persist(path),
            None => Ok(()),
        }
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.archive_path.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::weather_record::WeatherRecord;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned days and records every call.
    pub(crate) struct ScriptedSource {
        fields: Vec<String>,
        days: HashMap<NaiveDate, Vec<WeatherRecord>>,
        pub(crate) calls: Mutex<Vec<NaiveDate>>,
    }

    impl ScriptedSource {
        pub(crate) fn new() -> Self {
            Self {
                fields: vec!["cloudcover".to_string(), "solarradiation".to_string()],
                days: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Serves a full day of hourly records with deterministic values.
        pub(crate) fn with_day(mut self, day: NaiveDate) -> Self {
            let records = (0..24)
                .map(|hour| {
                    WeatherRecord::new(day.and_hms_opt(hour, 0, 0).unwrap())
                        .with_value("cloudcover", f64::from(hour))
                        .with_value("solarradiation", f64::from(hour * 10))
                })
                .collect();
            self.days.insert(day, records);
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl WeatherSource for ScriptedSource {
        fn fields(&self) -> &[String] {
            &self.fields
        }

        async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<WeatherRecord>, FetchError> {
            self.calls.lock().unwrap().push(day);
            self.days
                .get(&day)
                .cloned()
                .ok_or(FetchError::MissingDay { day })
        }
    }

    pub(crate) fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    pub(crate) fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        date(d).and_hms_opt(h, m, 0).unwrap()
    }

    pub(crate) fn scenario_observations() -> Vec<Observation> {
        vec![
            Observation::new("IMG_0001.png", at(1, 13, 5)).with_measurement(512.0),
            Observation::new("IMG_0002.png", at(1, 13, 50)).with_measurement(498.5),
            Observation::new("IMG_0003.png", at(2, 9, 0)),
        ]
    }

    #[tokio::test]
    async fn cold_cache_fetches_each_day_once() -> Result<(), EnrichError> {
        let source = ScriptedSource::new().with_day(date(1)).with_day(date(2));
        let enricher = Enricher::new(source);

        let result = enricher
            .enrich(&scenario_observations(), WeatherArchive::default())
            .await?;

        let mut calls = enricher.source().calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, [date(1), date(2)]);
        assert_eq!(result.fetched_days, [date(1), date(2)]);
        assert!(result.failures.is_empty());

        let grids: Vec<_> = result.rows.iter().map(|row| row.grid_timestamp).collect();
        assert_eq!(grids, [at(1, 14, 0), at(1, 14, 0), at(2, 10, 0)]);
        assert_eq!(result.rows[0].weather, result.rows[1].weather);
        assert_eq!(result.rows[0].weather_value("cloudcover"), Some(14.0));
        assert_eq!(result.rows[2].weather_value("solarradiation"), Some(100.0));
        assert_eq!(result.rows[1].observation.filename, "IMG_0002.png");
        assert_eq!(result.archive.len(), 48);
        Ok(())
    }

    #[tokio::test]
    async fn warm_cache_makes_no_calls() -> Result<(), EnrichError> {
        let mut archive = WeatherArchive::new(["cloudcover"]);
        archive.append([
            WeatherRecord::new(at(1, 14, 0)).with_value("cloudcover", 80.0),
            WeatherRecord::new(at(2, 10, 0)).with_value("cloudcover", 20.0),
        ]);
        let enricher = Enricher::new(ScriptedSource::new());

        let result = enricher.enrich(&scenario_observations(), archive).await?;

        assert_eq!(enricher.source().call_count(), 0);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[2].weather_value("cloudcover"), Some(20.0));
        Ok(())
    }

    #[tokio::test]
    async fn failed_days_keep_their_rows() -> Result<(), EnrichError> {
        let enricher = Enricher::new(ScriptedSource::new());

        let result = enricher
            .enrich(&scenario_observations(), WeatherArchive::default())
            .await?;

        assert_eq!(result.rows.len(), 3);
        assert!(result.rows.iter().all(|row| row.weather.is_none()));
        let mut failed = result.failed_days();
        failed.sort();
        assert_eq!(failed, [date(1), date(2)]);
        assert!(result.archive.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn partial_failure_still_enriches_the_rest() -> Result<(), EnrichError> {
        let mut archive = WeatherArchive::new(["cloudcover"]);
        archive.append([WeatherRecord::new(at(5, 8, 0)).with_value("cloudcover", 1.0)]);
        let mut observations = scenario_observations();
        observations.push(Observation::new("IMG_0004.png", at(5, 7, 30)));
        let enricher = Enricher::new(ScriptedSource::new().with_day(date(2)));

        let result = enricher.enrich(&observations, archive).await?;

        assert_eq!(result.rows.len(), 4);
        assert!(result.rows[0].weather.is_none());
        assert!(result.rows[1].weather.is_none());
        assert_eq!(result.rows[2].weather_value("cloudcover"), Some(10.0));
        assert_eq!(result.rows[3].weather_value("cloudcover"), Some(1.0));
        assert_eq!(result.failed_days(), [date(1)]);
        assert_eq!(result.fetched_days, [date(2)]);
        Ok(())
    }

    #[tokio::test]
    async fn fetched_days_are_persisted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("api_archive.csv");
        let enricher = Enricher::new(ScriptedSource::new().with_day(date(1)).with_day(date(2)))
            .with_archive_path(&path)
            .with_concurrency(1);

        let result = enricher
            .enrich(&scenario_observations(), WeatherArchive::default())
            .await?;

        let on_disk = WeatherArchive::load(&path)?;
        assert_eq!(on_disk, result.archive);

        // Running again against the persisted archive buys nothing.
        let rerun = Enricher::new(ScriptedSource::new());
        let again = rerun.enrich(&scenario_observations(), on_disk).await?;
        assert_eq!(rerun.source().call_count(), 0);
        assert_eq!(again.rows, result.rows);
        Ok(())
    }

    #[tokio::test]
    async fn persist_failure_is_reported_and_day_is_bought_again(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("not_a_directory");
        std::fs::write(&blocker, "")?;
        let path = blocker.join("api_archive.csv");
        let enricher = Enricher::new(ScriptedSource::new().with_day(date(1)).with_day(date(2)))
            .with_archive_path(&path)
            .with_concurrency(1);

        let result = enricher
            .enrich(&scenario_observations(), WeatherArchive::default())
            .await?;

        assert_eq!(result.rows.len(), 3);
        assert!(result.rows.iter().all(|row| row.weather.is_some()));
        assert_eq!(result.fetched_days, [date(1), date(2)]);
        assert!(result.failed_days().is_empty());
        let persist_failures = result
            .failures
            .iter()
            .filter(|failure| matches!(failure, EnrichFailure::Persist(ArchiveError::DirCreation(..))))
            .count();
        assert_eq!(persist_failures, 2);

        // Nothing reached the disk, so the next run pays for both days again.
        let on_disk = WeatherArchive::load(&path)?;
        assert!(on_disk.is_empty());
        let rerun = Enricher::new(ScriptedSource::new().with_day(date(1)).with_day(date(2)));
        let again = rerun.enrich(&scenario_observations(), on_disk).await?;
        let mut calls = rerun.source().calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, [date(1), date(2)]);
        assert_eq!(again.rows, result.rows);
        Ok(())
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() -> Result<(), EnrichError> {
        let enricher = Enricher::new(ScriptedSource::new());
        let result = enricher.enrich(&[], WeatherArchive::default()).await?;
        assert!(result.rows.is_empty());
        assert_eq!(enricher.source().call_count(), 0);
        Ok(())
    }
}
