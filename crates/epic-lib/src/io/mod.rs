//! Reading epoch exports and writing extracted data.

pub mod cell_types;
pub mod csv;
pub mod export;

pub use export::{parse_epochs, read_epochs, write_records, LoadOptions};
