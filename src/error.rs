use crate::archive::error::ArchiveError;
use crate::config::ConfigError;
use crate::enrich::error::EnrichError;
use crate::fetch::error::FetchError;
use crate::tables::error::TableError;
use crate::vision::error::VisionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolarEnrichError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
