//! Boundary with the OCR backend that reads the sensor-app screenshots.
//!
//! The OCR engine itself is external. This module parses its detection
//! payloads and turns the transcribed text into fixed-shape readings.

pub mod error;
pub mod extractor;
