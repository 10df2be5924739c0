use crate::combine::combiner::output_columns;
use crate::tables::error::TableError;
use crate::tables::frame::{format_number, text_frame, write_csv};
use crate::time::parse::format_timestamp;
use crate::types::rows::CombinedRow;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn cell(row: &CombinedRow, column: &str) -> Option<String> {
    match column {
        "timestamp" => Some(format_timestamp(row.timestamp)),
        "location" => Some(row.location.clone()),
        "measurement" => row.measurement.map(format_number),
        "sky" => row.sky.clone(),
        "filename" => Some(row.filename.clone()),
        "latitude" => row.coordinates.map(|c| format_number(c.latitude())),
        "longitude" => row.coordinates.map(|c| format_number(c.longitude())),
        field => row.weather_value(field).map(format_number),
    }
}

/// Writes the combined table to `path` with the fixed column order
/// `timestamp, location, measurement, <weather_fields>, sky, filename,
/// latitude, longitude`. Absent values are empty cells.
pub fn write_combined(
    path: &Path,
    rows: &[CombinedRow],
    weather_fields: &[String],
) -> Result<(), TableError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| TableError::DirCreation(parent.to_path_buf(), e))?;
    }

    let columns: Vec<(String, Vec<Option<String>>)> = output_columns(weather_fields)
        .into_iter()
        .map(|column| {
            let cells = rows.iter().map(|row| cell(row, &column)).collect();
            (column, cells)
        })
        .collect();
    let mut df = text_frame(columns).map_err(|e| TableError::WritePolars(path.to_path_buf(), e))?;

    let file = File::create(path).map_err(|e| TableError::WriteIo(path.to_path_buf(), e))?;
    write_csv(BufWriter::new(file), &mut df)
        .map_err(|e| TableError::WritePolars(path.to_path_buf(), e))?;
    info!("Wrote {} combined rows to {:?}", rows.len(), path);
    Ok(())
}
