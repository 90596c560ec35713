//! Output module for harvested records
//!
//! This module handles:
//! - Writing records to a CSV table
//! - Summarizing a run for the terminal

mod csv_export;
pub mod stats;

pub use csv_export::{CsvExporter, ExportSummary, UTF8_BOM};
pub use stats::{format_report, print_report, HarvestReport};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
