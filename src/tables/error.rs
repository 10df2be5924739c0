use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Table '{0}' could not be read")]
    Unreadable(PathBuf, #[source] PolarsError),

    #[error("Table '{path}' has no {column} column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Table '{path}', row {row}: cannot read '{value}' in column '{column}'")]
    BadCell {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error("Failed to create output directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing table '{0}'")]
    WriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing table '{0}'")]
    WritePolars(PathBuf, #[source] PolarsError),
}
