//! Runs the full enrichment pipeline on local CSV files.
//!
//! ```text
//! API_KEY=... ZIPCODE=46404 cargo run --example run_pipeline -- \
//!     observations.csv sky.csv locations.csv combined.csv
//! ```
//!
//! Set RUST_LOG=info (or debug) to see what is fetched and cached.

use solar_enrich::{
    load_location_labels, load_observations, load_sky_states, AnchoredKMeans, EnrichConfig,
    EnrichFailure, Pipeline, SolarEnrichError, VisualCrossingClient,
};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), SolarEnrichError> {
    env_logger::init();

    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let [observations_path, sky_path, locations_path, output_path] = args.as_slice() else {
        eprintln!("usage: run_pipeline <observations.csv> <sky.csv> <locations.csv> <output.csv>");
        std::process::exit(2);
    };

    let config = EnrichConfig::from_env()?;
    println!("Weather archive: {}", config.archive_path.display());

    let observations = load_observations(observations_path)?;
    let sky_states = load_sky_states(sky_path)?;
    let locations = load_location_labels(locations_path)?;

    let client = VisualCrossingClient::builder()
        .api_key(config.api_key.clone())
        .location(config.location.clone())
        .fields(config.fields.clone())
        .timeout(config.fetch_timeout)
        .max_retries(config.fetch_retries)
        .build()?;
    let pipeline = Pipeline::builder()
        .source(client)
        .clusterer(AnchoredKMeans::default())
        .archive_path(config.archive_path.clone())
        .concurrency(config.fetch_concurrency)
        .build();

    let report = pipeline
        .run()
        .observations(&observations)
        .sky_states(&sky_states)
        .locations(&locations)
        .output_path(output_path)
        .call()
        .await?;

    println!(
        "Wrote {} rows to {} ({} day(s) fetched)",
        report.rows.len(),
        output_path.display(),
        report.fetched_days.len()
    );
    let unlocated = observations
        .iter()
        .filter(|observation| observation.coordinates.is_none())
        .count();
    if unlocated > 0 {
        println!("{} observation(s) have no usable coordinates", unlocated);
    }
    for failure in &report.failures {
        match failure {
            EnrichFailure::Fetch { day, error } => println!("No weather for {}: {}", day, error),
            EnrichFailure::Persist(error) => println!("Archive not saved: {}", error),
        }
    }
    Ok(())
}
