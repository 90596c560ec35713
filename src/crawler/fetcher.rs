//! Resilient HTTP fetcher
//!
//! Every attempt takes one permit from the global concurrency limiter and one
//! session from the proxy pool, then issues a single GET:
//!
//! | Outcome | Action |
//! |---------|--------|
//! | HTTP 200 | Body returned |
//! | Any other status | Logged, not retried |
//! | Connection error / timeout | Retried with exponential backoff |
//! | No session in the pool | Logged, not retried |
//!
//! The permit is dropped before the backoff wait so that a failing URL does
//! not hold a slot while it sleeps.

use crate::crawler::pool::{ProxyEndpoint, ProxyPool};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::session::TransportError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Why a fetch produced no body
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no session available")]
    NoSession,

    #[error("HTTP {status} via {proxy}")]
    Status { status: u16, proxy: ProxyEndpoint },

    #[error("{source} via {proxy} (attempt {attempt})")]
    Transport {
        source: TransportError,
        proxy: ProxyEndpoint,
        attempt: u32,
    },

    #[error("concurrency limiter closed")]
    LimiterClosed,
}

impl FetchError {
    /// Only transport failures are retried; status errors are final
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Fetches pages through the proxy pool under a shared concurrency limit
#[derive(Debug, Clone)]
pub struct Fetcher {
    pool: Arc<ProxyPool>,
    limiter: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(pool: Arc<ProxyPool>, limiter: Arc<Semaphore>, retry: RetryPolicy) -> Self {
        Self {
            pool,
            limiter,
            retry,
        }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    /// Fetches `url`, retrying transient transport failures
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Body of a `200 OK` response
    /// * `Err(FetchError)` - Error of the last attempt
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.retry
            .run(FetchError::is_transient, move |attempt| {
                self.attempt(url, attempt)
            })
            .await
    }

    async fn attempt(&self, url: &str, attempt: u32) -> Result<String, FetchError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| FetchError::LimiterClosed)?;

        let Some((session, proxy)) = self.pool.acquire() else {
            tracing::warn!(url, "No session available, skipping");
            return Err(FetchError::NoSession);
        };

        match session.get(url).await {
            Ok(response) if response.is_ok() => {
                tracing::info!(
                    proxy = %proxy,
                    url,
                    attempt,
                    bytes = response.body.len(),
                    "Fetched"
                );
                Ok(response.body)
            }
            Ok(response) => {
                tracing::warn!(
                    proxy = %proxy,
                    url,
                    attempt,
                    status = response.status,
                    "Request failed"
                );
                Err(FetchError::Status {
                    status: response.status,
                    proxy,
                })
            }
            Err(source) => {
                tracing::warn!(proxy = %proxy, url, attempt, error = %source, "Request error");
                Err(FetchError::Transport {
                    source,
                    proxy,
                    attempt,
                })
            }
        }
    }
}
