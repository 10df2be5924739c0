use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    /// An observation classified as covered by the archive found no record
    /// when joined. This is a bug, not a data problem.
    #[error("Observation '{filename}' was expected to join the archive record at {grid_timestamp}, but none exists")]
    JoinIntegrity {
        filename: String,
        grid_timestamp: NaiveDateTime,
    },
}
