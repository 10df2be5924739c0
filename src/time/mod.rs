//! Timestamp handling shared by every stage of the pipeline.
//!
//! All timestamps are naive local time. Nothing in this crate converts between
//! timezones; offsets found in input strings are dropped, not applied.

pub mod interval;
pub mod parse;
