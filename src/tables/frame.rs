//! Thin helpers over polars for the all-text CSV tables this crate reads and
//! writes. Every column is read as a string and parsed by the caller, so a
//! timestamp column can never come back as the wrong type after a round trip.

use polars::prelude::*;
use std::io::Write;
use std::path::Path;

/// Reads a CSV file with a header row, keeping every cell as text.
pub(crate) fn read_text_csv(path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Returns the cells of column `name` as owned strings. Empty cells come back
/// as `None`.
pub(crate) fn text_cells(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|cell| !cell.is_empty())
                .map(str::to_owned)
        })
        .collect())
}

/// Builds a frame of string columns, in the given order.
pub(crate) fn text_frame(columns: Vec<(String, Vec<Option<String>>)>) -> PolarsResult<DataFrame> {
    let columns = columns
        .into_iter()
        .map(|(name, cells)| Column::new(name.into(), cells))
        .collect::<Vec<_>>();
    DataFrame::new(columns)
}

pub(crate) fn write_csv<W: Write>(writer: W, df: &mut DataFrame) -> PolarsResult<()> {
    CsvWriter::new(writer).include_header(true).finish(df)
}

/// Pandas writes its row index as an unnamed first column, which comes back
/// with an empty, `Unnamed: 0` or `column_1` style name. Such columns carry no
/// data and are skipped on read.
pub(crate) fn is_index_column(name: &str) -> bool {
    name.is_empty() || name.starts_with("Unnamed") || name.starts_with("column_")
}

/// Formats a number so that parsing it back yields the identical `f64`.
pub(crate) fn format_number(value: f64) -> String {
    value.to_string()
}
