pub mod error;
pub mod source;
pub mod visual_crossing;
