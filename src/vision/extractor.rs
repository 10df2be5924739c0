use crate::types::observation::{LatLon, Observation};
use crate::vision::error::VisionError;
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

const IRRADIANCE_UNITS: [&str; 2] = ["W/m2", "W/m²"];
// OCR regularly reads the capital I of "Irradiance" as a lowercase l.
const IRRADIANCE_LABELS: [&str; 2] = ["SolarIrradiance", "Solarlrradiance"];
const DEGREE_SIGN: char = '°';

/// One text box found by the OCR backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Detection {
    pub transcription: String,
    #[serde(default)]
    pub score: Option<f64>,
    /// Corner points of the text box, in pixels.
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
}

/// Parses one line of OCR output.
///
/// The backend writes `<image name>\t<JSON array of detections>`; a bare JSON
/// array is accepted as well.
pub fn parse_detections(line: &str) -> Result<Vec<Detection>, VisionError> {
    let (image, payload) = match line.split_once('\t') {
        Some((image, payload)) => (image.trim(), payload),
        None => ("<unnamed>", line),
    };
    serde_json::from_str(payload.trim()).map_err(|source| VisionError::Payload {
        image: image.to_string(),
        source,
    })
}

/// A reading field the extractor looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractedField {
    Measurement,
    Latitude,
    Longitude,
}

impl fmt::Display for ExtractedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractedField::Measurement => "measurement",
            ExtractedField::Latitude => "latitude",
            ExtractedField::Longitude => "longitude",
        };
        write!(f, "{name}")
    }
}

/// What could be read from a single screenshot. Unreadable fields are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScreenshotReading {
    pub filename: String,
    pub measurement: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ScreenshotReading {
    /// Both coordinates, unless either is missing or the pair is a
    /// "no fix" sentinel.
    pub fn coordinates(&self) -> Option<LatLon> {
        LatLon::from_raw(self.latitude?, self.longitude?)
    }

    pub fn unresolved_fields(&self) -> Vec<ExtractedField> {
        let coordinates_ok = self.coordinates().is_some();
        let mut missing = Vec::new();
        if self.measurement.is_none() {
            missing.push(ExtractedField::Measurement);
        }
        if self.latitude.is_none() || !coordinates_ok {
            missing.push(ExtractedField::Latitude);
        }
        if self.longitude.is_none() || !coordinates_ok {
            missing.push(ExtractedField::Longitude);
        }
        missing
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim_matches(|c: char| c == ':' || c == '=')
        .parse::<f64>()
        .ok()
}

fn extract_irradiance(text: &str) -> Option<f64> {
    for unit in IRRADIANCE_UNITS {
        let Some(end) = text.rfind(unit) else {
            continue;
        };
        if text == unit {
            continue;
        }
        let start = IRRADIANCE_LABELS
            .iter()
            .filter_map(|label| text.find(label).map(|index| index + label.len()))
            .last()
            .unwrap_or(0);
        if start <= end {
            if let Some(value) = parse_number(&text[start..end]) {
                return Some(value);
            }
        }
        debug!("Could not read irradiance from '{}'", text);
    }
    None
}

fn extract_coordinate(text: &str, label: &str) -> Option<f64> {
    let start = text.find(label)? + label.len();
    let value = match text.rfind(DEGREE_SIGN) {
        Some(end) if end >= start => parse_number(&text[start..end]),
        // The degree sign is sometimes not picked up at all.
        None if !text.chars().all(char::is_alphabetic) => parse_number(&text[start..]),
        _ => None,
    };
    if value.is_none() {
        debug!("Could not read {} from '{}'", label, text);
    }
    value
}

/// Reads irradiance and coordinates out of the detections of one screenshot.
///
/// Each transcription is normalised by removing spaces and underscores (the
/// OCR reads some spaces as underscores). Irradiance is the number in front of
/// the last `W/m2`/`W/m²`, after an optional "Solar Irradiance" label.
/// Latitude and longitude are the numbers following their label, up to the
/// last degree sign when there is one.
pub fn extract_reading(filename: impl Into<String>, detections: &[Detection]) -> ScreenshotReading {
    let mut reading = ScreenshotReading {
        filename: filename.into(),
        ..Default::default()
    };
    for detection in detections {
        let text: String = detection
            .transcription
            .chars()
            .filter(|c| *c != '_' && *c != ' ')
            .collect();

        if let Some(value) = extract_irradiance(&text) {
            reading.measurement = Some(value);
        }
        if let Some(value) = extract_coordinate(&text, "Latitude") {
            reading.latitude = Some(value);
        }
        if let Some(value) = extract_coordinate(&text, "Longitude") {
            reading.longitude = Some(value);
        }
    }
    reading
}

/// Why a screenshot is listed as an extraction failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionFailureReason {
    /// These fields could not be read.
    Unresolved(Vec<ExtractedField>),
    /// No creation timestamp is known for the screenshot.
    MissingTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFailure {
    pub filename: String,
    pub reason: ExtractionFailureReason,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ExtractionFailureReason::Unresolved(fields) => {
                let fields: Vec<String> = fields.iter().map(ToString::to_string).collect();
                write!(f, "{}: could not read {}", self.filename, fields.join(", "))
            }
            ExtractionFailureReason::MissingTimestamp => {
                write!(f, "{}: no timestamp", self.filename)
            }
        }
    }
}

/// Observations built from screenshot readings, plus everything that could
/// not be read cleanly.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub observations: Vec<Observation>,
    pub failures: Vec<ExtractionFailure>,
}

/// Joins readings with screenshot creation times by file name.
///
/// A reading with no timestamp, or with nothing readable at all, is left out
/// and reported. A partially read screenshot becomes an observation with the
/// unreadable fields absent, and is reported as well.
pub fn observations_from_readings(
    readings: impl IntoIterator<Item = ScreenshotReading>,
    timestamps: &HashMap<String, NaiveDateTime>,
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    for reading in readings {
        let Some(&timestamp) = timestamps.get(&reading.filename) else {
            warn!("No timestamp for screenshot '{}'", reading.filename);
            outcome.failures.push(ExtractionFailure {
                filename: reading.filename,
                reason: ExtractionFailureReason::MissingTimestamp,
            });
            continue;
        };

        let unresolved = reading.unresolved_fields();
        let nothing_read = unresolved.len() == 3;
        if !unresolved.is_empty() {
            outcome.failures.push(ExtractionFailure {
                filename: reading.filename.clone(),
                reason: ExtractionFailureReason::Unresolved(unresolved),
            });
        }
        if nothing_read {
            warn!("Nothing readable in screenshot '{}'", reading.filename);
            continue;
        }

        outcome.observations.push(Observation {
            coordinates: reading.coordinates(),
            filename: reading.filename,
            timestamp,
            measurement: reading.measurement,
        });
    }
    outcome
}
