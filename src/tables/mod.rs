pub mod error;
pub(crate) mod frame;
pub mod input;
pub mod output;
