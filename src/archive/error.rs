use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The file exists but its contents cannot be turned back into weather
    /// records. The file on disk is left untouched.
    #[error("Weather archive '{path}' is corrupt: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    /// The file exists but is not a readable CSV table. Like
    /// `CorruptArchive`, reported by [`ArchiveError::is_corrupt`].
    #[error("Weather archive '{0}' could not be parsed as a table")]
    Unreadable(PathBuf, #[source] PolarsError),

    #[error("Failed to create archive directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing weather archive '{0}'")]
    WriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing weather archive '{0}'")]
    WritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to move new weather archive into place at '{0}'")]
    Persist(PathBuf, #[source] tempfile::PersistError),
}

impl ArchiveError {
    /// `true` for the read-side failures that mean the archive on disk cannot
    /// be used as a cache.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            ArchiveError::CorruptArchive { .. } | ArchiveError::Unreadable(..)
        )
    }
}
