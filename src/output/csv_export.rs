//! CSV export of harvested records
//!
//! The file starts with a UTF-8 byte order mark so that spreadsheet tools
//! pick the right encoding for scraped text (currency signs, accents, ...).

use crate::config::OutputConfig;
use crate::crawler::Record;
use crate::output::OutputResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// UTF-8 byte order mark written at the start of every export
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const HEADER: [&str; 3] = ["title", "price", "description"];

/// Outcome of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Rows written after the header
    pub written: usize,
    /// Records that could not be written
    pub skipped: usize,
}

/// Writes records as a CSV table with a header row
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
    include_url: bool,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>, include_url: bool) -> Self {
        Self {
            path: path.into(),
            include_url,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.csv_path, config.include_url)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `records` to the configured path, replacing any previous file
    ///
    /// Nothing is written when there are no records. A record whose row fails
    /// to serialize is logged, counted as skipped and the export carries on.
    ///
    /// # Returns
    ///
    /// * `Ok(ExportSummary)` - Rows written and skipped
    /// * `Err(OutputError)` - The file could not be created or flushed
    pub fn export(&self, records: &[Record]) -> OutputResult<ExportSummary> {
        let mut summary = ExportSummary {
            path: self.path.clone(),
            written: 0,
            skipped: 0,
        };

        if records.is_empty() {
            tracing::warn!("No records to export, {} not written", self.path.display());
            return Ok(summary);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = BufWriter::new(File::create(&self.path)?);
        file.write_all(UTF8_BOM)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(self.header())?;

        for (index, record) in records.iter().enumerate() {
            match writer.write_record(self.row(record)) {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    summary.skipped += 1;
                    tracing::warn!(
                        row = index,
                        url = %record.url,
                        error = %e,
                        "Failed to write record, skipping"
                    );
                }
            }
        }

        writer.flush()?;

        tracing::info!(
            "Exported {} record(s) to {} ({} skipped)",
            summary.written,
            self.path.display(),
            summary.skipped
        );

        Ok(summary)
    }

    fn header(&self) -> Vec<&'static str> {
        let mut header = HEADER.to_vec();
        if self.include_url {
            header.push("url");
        }
        header
    }

    fn row<'a>(&self, record: &'a Record) -> Vec<&'a str> {
        let mut row = vec![
            record.title.as_str(),
            record.price.as_str(),
            record.description.as_str(),
        ];
        if self.include_url {
            row.push(record.url.as_str());
        }
        row
    }
}
