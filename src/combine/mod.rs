pub mod cluster;
pub mod combiner;
