//! One complete run: load the archive, enrich the observations, combine with
//! the sky log and site names, and write the result.

use crate::archive::store::WeatherArchive;
use crate::combine::cluster::LocationClusterer;
use crate::combine::combiner::combine;
use crate::enrich::engine::{EnrichFailure, Enricher};
use crate::error::SolarEnrichError;
use crate::fetch::source::WeatherSource;
use crate::tables::output::write_combined;
use crate::types::location_label::LocationLabel;
use crate::types::observation::Observation;
use crate::types::rows::CombinedRow;
use crate::types::sky_state::SkyState;
use bon::bon;
use chrono::NaiveDate;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    /// One row per input observation, in input order.
    pub rows: Vec<CombinedRow>,
    /// Weather columns present in `rows`, in output order.
    pub weather_fields: Vec<String>,
    pub fetched_days: Vec<NaiveDate>,
    /// Days and archive writes that failed. The run completed without them.
    pub failures: Vec<EnrichFailure>,
}

impl PipelineReport {
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

/// Enrichment pipeline over a weather source and a location clusterer.
pub struct Pipeline<S, C> {
    enricher: Enricher<S>,
    clusterer: C,
}

#[bon]
impl<S: WeatherSource, C: LocationClusterer> Pipeline<S, C> {
    /// Creates a pipeline.
    ///
    /// # Arguments
    ///
    /// * `.source(S)`: **Required.** Where missing weather days are bought.
    /// * `.clusterer(C)`: **Required.** Names observation coordinates.
    /// * `.archive_path(PathBuf)`: Optional. Archive file loaded at the start of
    ///   a run and rewritten after each fetched day. Without it the run starts
    ///   from an empty archive and keeps nothing.
    /// * `.concurrency(usize)`: Optional. Days fetched at the same time. Defaults to 4.
    #[builder]
    pub fn new(
        source: S,
        clusterer: C,
        #[builder(into)] archive_path: Option<PathBuf>,
        concurrency: Option<usize>,
    ) -> Self {
        let mut enricher = Enricher::new(source);
        if let Some(path) = archive_path {
            enricher = enricher.with_archive_path(path);
        }
        if let Some(concurrency) = concurrency {
            enricher = enricher.with_concurrency(concurrency);
        }
        Self {
            enricher,
            clusterer,
        }
    }

    /// Runs the pipeline over `observations`.
    ///
    /// # Arguments
    ///
    /// * `.observations(&[Observation])`: **Required.**
    /// * `.sky_states(&[SkyState])`: Optional. Hand-logged sky conditions.
    /// * `.locations(&[LocationLabel])`: Optional. Reference sites used to name rows.
    /// * `.output_path(&Path)`: Optional. Where to write the combined table.
    ///
    /// # Errors
    ///
    /// Fails if the archive file is corrupt, if the output cannot be written, or
    /// on a join integrity bug. Failed days are not errors; they are listed in
    /// [`PipelineReport::failures`].
    #[builder]
    pub async fn run(
        &self,
        observations: &[Observation],
        sky_states: Option<&[SkyState]>,
        locations: Option<&[LocationLabel]>,
        output_path: Option<&Path>,
    ) -> Result<PipelineReport, SolarEnrichError> {
        let archive = match self.enricher.archive_path() {
            Some(path) => WeatherArchive::load(path)?,
            None => WeatherArchive::new(self.enricher.source().fields().iter().cloned()),
        };

        let enrichment = self.enricher.enrich(observations, archive).await?;
        if !enrichment.failures.is_empty() {
            warn!(
                "{} fetch or persist failure(s) during enrichment",
                enrichment.failures.len()
            );
        }

        let weather_fields = self.enricher.source().fields().to_vec();
        let rows = combine(
            &enrichment.rows,
            sky_states.unwrap_or_default(),
            locations.unwrap_or_default(),
            &self.clusterer,
        );

        if let Some(path) = output_path {
            write_combined(path, &rows, &weather_fields)?;
        }
        info!(
            "Pipeline finished: {} rows, {} day(s) fetched",
            rows.len(),
            enrichment.fetched_days.len()
        );

        Ok(PipelineReport {
            rows,
            weather_fields,
            fetched_days: enrichment.fetched_days,
            failures: enrichment.failures,
        })
    }
}
