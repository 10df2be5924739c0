mod archive;
mod combine;
mod config;
mod enrich;
mod error;
mod fetch;
mod pipeline;
mod tables;
mod time;
mod types;
mod vision;

pub use error::SolarEnrichError;
pub use pipeline::*;

pub use config::{default_archive_path, ConfigError, EnrichConfig};

pub use time::interval::{align_to_interval, fetch_day, is_aligned};
pub use time::parse::{format_timestamp, parse_date_and_time, parse_timestamp, TIMESTAMP_FORMAT};

pub use types::location_label::LocationLabel;
pub use types::observation::{LatLon, Observation};
pub use types::rows::{CombinedRow, EnrichedRow, MISSING_LOCATION};
pub use types::sky_state::SkyState;
pub use types::weather_record::WeatherRecord;

pub use archive::error::ArchiveError;
pub use archive::store::{WeatherArchive, TIMESTAMP_COLUMN};

pub use fetch::error::FetchError;
pub use fetch::source::WeatherSource;
pub use fetch::visual_crossing::{epoch_to_local, VisualCrossingClient, DEFAULT_BASE_URL};

pub use enrich::engine::{EnrichFailure, Enricher, Enrichment};
pub use enrich::error::EnrichError;
pub use enrich::needs::{day_strings, determine_needs};

pub use combine::cluster::{AnchoredKMeans, LocationClusterer, UNLABELED_LOCATION};
pub use combine::combiner::{combine, output_columns, LEADING_COLUMNS, TRAILING_COLUMNS};

pub use tables::error::TableError;
pub use tables::input::{load_location_labels, load_observations, load_sky_states};
pub use tables::output::write_combined;

pub use vision::error::VisionError;
pub use vision::extractor::{
    extract_reading, observations_from_readings, parse_detections, Detection, ExtractedField,
    ExtractionFailure, ExtractionFailureReason, ExtractionOutcome, ScreenshotReading,
};
