//! Crawler coordinator - two-phase harvest orchestration
//!
//! A run goes through three strictly sequential phases:
//! 1. Enumerate the listing page URLs (supplied by the caller)
//! 2. Discover: fetch every listing page and collect its detail links
//! 3. Collect: fetch every detail page and extract its record
//!
//! All fetches of a phase are started together and gated by the shared
//! concurrency limiter. A URL that fails is dropped from its phase; it never
//! fails the run.

use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{Extractor, Record};
use crate::crawler::pool::ProxyPool;
use crate::crawler::retry::RetryPolicy;
use crate::output::HarvestReport;
use crate::HarvestError;
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use url::Url;

/// Characters of a title shown in per-record log lines
const TITLE_LOG_CHARS: usize = 30;

struct PhaseCounts {
    listing_fetched: usize,
    discovered: usize,
    records: Vec<Record>,
}

/// Main harvest coordinator
///
/// The coordinator owns the session pool for the whole run and shuts it down
/// when the run ends, whatever the outcome.
pub struct Coordinator {
    fetcher: Fetcher,
    extractor: Extractor,
    run_timeout: Option<Duration>,
}

impl Coordinator {
    /// Creates a coordinator around an initialized pool
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError::NoSessions)` - The pool holds no session
    pub fn new(
        config: &Config,
        extractor: Extractor,
        pool: ProxyPool,
    ) -> Result<Self, HarvestError> {
        if pool.is_empty() {
            return Err(HarvestError::NoSessions);
        }

        let limiter = Arc::new(Semaphore::new(config.crawler.concurrency));
        let fetcher = Fetcher::new(
            Arc::new(pool),
            limiter,
            RetryPolicy::from_config(&config.retry),
        );
        let run_timeout = match config.crawler.run_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self::from_parts(fetcher, extractor, run_timeout))
    }

    /// Assembles a coordinator from an existing fetcher
    pub fn from_parts(
        fetcher: Fetcher,
        extractor: Extractor,
        run_timeout: Option<Duration>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            run_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        self.fetcher.pool()
    }

    /// Runs the harvest over the given listing pages
    ///
    /// The session pool is shut down exactly once before this returns,
    /// including when the run timeout fires or a phase panics. A panic is
    /// resumed once the sessions are closed.
    pub async fn run(self, listing_urls: Vec<String>) -> Result<HarvestReport, HarvestError> {
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!(
            "Starting harvest of {} listing page(s) with {} session(s)",
            listing_urls.len(),
            self.pool().len()
        );

        let phases = async {
            match self.run_timeout {
                Some(limit) => tokio::time::timeout(limit, self.run_phases(&listing_urls))
                    .await
                    .map_err(|_| HarvestError::RunTimeout(limit)),
                None => Ok(self.run_phases(&listing_urls).await),
            }
        };
        let outcome = AssertUnwindSafe(phases).catch_unwind().await;

        self.pool().shutdown().await;

        let counts = match outcome {
            Ok(result) => result?,
            Err(panic) => {
                tracing::error!("Harvest aborted by a panic, sessions closed");
                std::panic::resume_unwind(panic);
            }
        };
        let report = HarvestReport {
            started_at,
            elapsed: start.elapsed(),
            listing_pages: listing_urls.len(),
            listing_fetched: counts.listing_fetched,
            discovered: counts.discovered,
            records: counts.records,
        };

        tracing::info!(
            "Harvest finished in {:.1}s: {} discovered, {} collected",
            report.elapsed.as_secs_f64(),
            report.discovered,
            report.collected()
        );

        Ok(report)
    }

    async fn run_phases(&self, listing_urls: &[String]) -> PhaseCounts {
        tracing::info!("Discovering detail links...");
        let (listing_fetched, detail_urls) = self.discover(listing_urls).await;
        tracing::info!(
            "Found {} detail link(s) on {}/{} listing page(s)",
            detail_urls.len(),
            listing_fetched,
            listing_urls.len()
        );

        tracing::info!("Collecting detail pages...");
        let records = self.collect(&detail_urls).await;
        tracing::info!(
            "Collected {} record(s) from {} detail page(s)",
            records.len(),
            detail_urls.len()
        );

        PhaseCounts {
            listing_fetched,
            discovered: detail_urls.len(),
            records,
        }
    }

    /// Fetches every listing page and flattens the links in listing order
    async fn discover(&self, listing_urls: &[String]) -> (usize, Vec<String>) {
        let fetches = listing_urls.iter().map(|url| self.fetch_links(url));
        let link_sets = join_all(fetches).await;

        let fetched = link_sets.iter().filter(|set| set.is_some()).count();
        let links = link_sets.into_iter().flatten().flatten().collect();
        (fetched, links)
    }

    /// Fetches every detail page, keeping the records that were extracted
    async fn collect(&self, detail_urls: &[String]) -> Vec<Record> {
        let fetches = detail_urls.iter().map(|url| self.fetch_record(url));
        join_all(fetches).await.into_iter().flatten().collect()
    }

    async fn fetch_links(&self, url: &str) -> Option<Vec<String>> {
        let base_url = match Url::parse(url) {
            Ok(base_url) => base_url,
            Err(e) => {
                tracing::warn!(url, error = %e, "Invalid listing URL, skipping");
                return None;
            }
        };

        match self.fetcher.fetch(url).await {
            Ok(body) => {
                let links = self.extractor.extract_links(&body, &base_url);
                tracing::info!(url, links = links.len(), "Parsed listing page");
                Some(links)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Skipping listing page");
                None
            }
        }
    }

    async fn fetch_record(&self, url: &str) -> Option<Record> {
        match self.fetcher.fetch(url).await {
            Ok(body) => {
                let record = self.extractor.extract_record(&body, url);
                let title: String = record.title.chars().take(TITLE_LOG_CHARS).collect();
                tracing::info!(url, title = %title, "Extracted record");
                Some(record)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Skipping detail page");
                None
            }
        }
    }
}
