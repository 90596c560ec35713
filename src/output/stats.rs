//! Run statistics
//!
//! A harvest reports how many pages it enumerated, fetched and extracted so
//! that partial loss is visible without failing the run.

use crate::crawler::Record;
use crate::output::ExportSummary;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of one harvest run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,

    /// Listing pages enumerated
    pub listing_pages: usize,

    /// Listing pages fetched successfully
    pub listing_fetched: usize,

    /// Detail links discovered across all listing pages
    pub discovered: usize,

    /// Records extracted, in discovery order
    pub records: Vec<Record>,
}

impl HarvestReport {
    /// Number of records collected
    pub fn collected(&self) -> usize {
        self.records.len()
    }

    /// Detail pages that produced no record
    pub fn lost(&self) -> usize {
        self.discovered.saturating_sub(self.records.len())
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Renders a report as the multi-line summary shown after a run
pub fn format_report(report: &HarvestReport, export: &ExportSummary) -> String {
    let mut out = String::from("=== Harvest Summary ===\n\n");

    out.push_str("Run:\n");
    out.push_str(&format!(
        "  Started: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "  Duration: {:.1}s\n\n",
        report.elapsed.as_secs_f64()
    ));

    out.push_str("Listing Pages:\n");
    out.push_str(&format!(
        "  Fetched: {} / {} ({:.1}%)\n",
        report.listing_fetched,
        report.listing_pages,
        percentage(report.listing_fetched, report.listing_pages)
    ));
    out.push_str(&format!(
        "  Detail links discovered: {}\n\n",
        report.discovered
    ));

    out.push_str("Detail Pages:\n");
    out.push_str(&format!(
        "  Collected: {} / {} ({:.1}%)\n",
        report.collected(),
        report.discovered,
        percentage(report.collected(), report.discovered)
    ));
    if report.lost() > 0 {
        out.push_str(&format!("  Skipped: {}\n", report.lost()));
    }
    out.push('\n');

    out.push_str("Export:\n");
    out.push_str(&format!("  File: {}\n", export.path.display()));
    out.push_str(&format!("  Rows written: {}\n", export.written));
    if export.skipped > 0 {
        out.push_str(&format!("  Rows skipped: {}\n", export.skipped));
    }

    out
}

/// Prints a report to stdout
pub fn print_report(report: &HarvestReport, export: &ExportSummary) {
    print!("{}", format_report(report, export));
}
