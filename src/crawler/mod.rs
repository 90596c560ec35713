//! Crawler module for catalog harvesting
//!
//! This module contains the core harvesting logic, including:
//! - The rotating pool of proxy sessions
//! - Resilient fetching with bounded concurrency and retries
//! - Listing page enumeration, link discovery and record extraction
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod parser;
mod pool;
mod retry;
mod seeds;
mod session;

#[cfg(test)]
mod testing;

pub use crate::output::HarvestReport;
pub use coordinator::Coordinator;
pub use fetcher::{FetchError, Fetcher};
pub use parser::{Extractor, Record, NO_DESCRIPTION, UNPRICED, UNTITLED};
pub use pool::{parse_endpoints, ProxyEndpoint, ProxyPool};
pub use retry::RetryPolicy;
pub use seeds::listing_urls;
pub use session::{
    HttpSession, HttpSessionFactory, RawResponse, Session, SessionFactory, SessionSettings,
    TransportError, TransportErrorKind,
};

use crate::config::Config;
use crate::output::{CsvExporter, ExportSummary};
use crate::{ConfigError, HarvestError};

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Open one HTTP session per configured proxy
/// 2. Fetch the listing pages and discover detail links
/// 3. Fetch the detail pages and extract records
/// 4. Close every session
/// 5. Export the records to CSV
///
/// # Arguments
///
/// * `config` - The validated harvester configuration
///
/// # Returns
///
/// * `Ok((HarvestReport, ExportSummary))` - Run completed, possibly with skipped pages
/// * `Err(HarvestError)` - Run could not start, timed out or could not export
pub async fn harvest(config: Config) -> Result<(HarvestReport, ExportSummary), HarvestError> {
    let settings = SessionSettings::from_config(&config.http)
        .map_err(|e| ConfigError::Validation(format!("Invalid HTTP header: {}", e)))?;
    let factory = HttpSessionFactory::new(settings);

    harvest_with(config, &factory).await
}

/// Runs a complete harvest with sessions built by `factory`
pub async fn harvest_with(
    config: Config,
    factory: &dyn SessionFactory,
) -> Result<(HarvestReport, ExportSummary), HarvestError> {
    let extractor = Extractor::new(&config.extractor)?;
    let endpoints = parse_endpoints(&config.http.proxies)?;

    let pool = ProxyPool::connect(endpoints, factory);
    if pool.is_empty() {
        return Err(HarvestError::NoSessions);
    }
    tracing::info!(
        "Session pool ready: {}",
        pool.active_endpoints()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let coordinator = Coordinator::new(&config, extractor, pool)?;
    let report = coordinator.run(listing_urls(&config.listing)).await?;

    let exporter = CsvExporter::from_config(&config.output);
    let export = exporter.export(&report.records)?;

    tracing::info!(
        discovered = report.discovered,
        collected = report.collected(),
        exported = export.written,
        "Harvest complete"
    );

    Ok((report, export))
}
