//! Proxy session pool
//!
//! The pool owns one session per configured proxy endpoint and hands them out
//! in round-robin order. When no proxy session can be built it falls back to a
//! single direct session, so a successfully initialized pool is never empty.

use crate::crawler::session::{Session, SessionFactory};
use crate::ConfigError;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Literal accepted in the proxy list for a direct connection
const DIRECT: &str = "direct";

/// A network egress path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProxyEndpoint {
    /// No proxy
    Direct,
    /// Requests are tunnelled through this proxy
    Proxy(Url),
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyEndpoint::Direct => f.write_str(DIRECT),
            ProxyEndpoint::Proxy(url) => write!(f, "{}", url),
        }
    }
}

impl FromStr for ProxyEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(DIRECT) {
            return Ok(ProxyEndpoint::Direct);
        }
        Url::parse(s)
            .map(ProxyEndpoint::Proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy URL '{}': {}", s, e)))
    }
}

/// Parses the configured proxy list, preserving its order
pub fn parse_endpoints(proxies: &[String]) -> Result<Vec<ProxyEndpoint>, ConfigError> {
    proxies.iter().map(|p| p.parse()).collect()
}

struct PooledSession {
    endpoint: ProxyEndpoint,
    session: Arc<dyn Session>,
}

/// Round-robin pool of proxy sessions
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    sessions: Vec<PooledSession>,
    cursor: AtomicUsize,
    initialized: bool,
    closed: AtomicBool,
}

impl ProxyPool {
    /// Creates an uninitialized pool for the given endpoints
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self {
            endpoints,
            sessions: Vec::new(),
            cursor: AtomicUsize::new(0),
            initialized: false,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a pool and initializes it in one step
    pub fn connect(endpoints: Vec<ProxyEndpoint>, factory: &dyn SessionFactory) -> Self {
        let mut pool = Self::new(endpoints);
        pool.initialize(factory);
        pool
    }

    /// Builds one session per endpoint
    ///
    /// Endpoints whose session cannot be built are logged and skipped. If that
    /// leaves the pool empty a direct session is added. Calling this again on
    /// an initialized pool does nothing.
    ///
    /// # Returns
    ///
    /// The number of sessions in the pool
    pub fn initialize(&mut self, factory: &dyn SessionFactory) -> usize {
        if self.initialized {
            return self.sessions.len();
        }

        tracing::info!(
            "Creating sessions for {} proxy endpoint(s)",
            self.endpoints.len()
        );

        for endpoint in &self.endpoints {
            match factory.open(endpoint) {
                Ok(session) => {
                    tracing::info!(proxy = %endpoint, "Session ready");
                    self.sessions.push(PooledSession {
                        endpoint: endpoint.clone(),
                        session,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        proxy = %endpoint,
                        error = %e,
                        "Failed to create session, skipping"
                    );
                }
            }
        }

        if self.sessions.is_empty() {
            tracing::warn!("No proxy session available, falling back to a direct connection");
            match factory.open(&ProxyEndpoint::Direct) {
                Ok(session) => self.sessions.push(PooledSession {
                    endpoint: ProxyEndpoint::Direct,
                    session,
                }),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create direct session");
                }
            }
        }

        self.initialized = true;
        tracing::info!("Session pool initialized with {} session(s)", self.sessions.len());
        self.sessions.len()
    }

    /// Returns the next session in round-robin order
    ///
    /// Concurrent callers each advance the cursor atomically, so the rotation
    /// stays evenly spread without being globally serialized.
    pub fn acquire(&self) -> Option<(Arc<dyn Session>, ProxyEndpoint)> {
        if self.sessions.is_empty() {
            return None;
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let pooled = &self.sessions[index];
        Some((Arc::clone(&pooled.session), pooled.endpoint.clone()))
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Endpoints that actually have a session, in rotation order
    pub fn active_endpoints(&self) -> Vec<ProxyEndpoint> {
        self.sessions.iter().map(|s| s.endpoint.clone()).collect()
    }

    /// Closes every session
    ///
    /// Close failures are logged and do not stop the remaining sessions from
    /// being closed. Only the first call has any effect.
    ///
    /// # Returns
    ///
    /// The number of sessions closed cleanly by this call
    pub async fn shutdown(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session pool already shut down");
            return 0;
        }

        tracing::info!("Closing {} session(s)...", self.sessions.len());

        let mut closed = 0;
        for pooled in &self.sessions {
            match pooled.session.close().await {
                Ok(()) => {
                    closed += 1;
                    tracing::info!(proxy = %pooled.endpoint, "Session closed");
                }
                Err(e) => {
                    tracing::warn!(
                        proxy = %pooled.endpoint,
                        error = %e,
                        "Error while closing session"
                    );
                }
            }
        }

        tracing::info!(
            "Session pool shut down ({}/{} closed cleanly)",
            closed,
            self.sessions.len()
        );
        closed
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPool")
            .field("endpoints", &self.endpoints)
            .field("active", &self.active_endpoints())
            .field("initialized", &self.initialized)
            .field("closed", &self.is_shut_down())
            .finish()
    }
}

impl Drop for ProxyPool {
    fn drop(&mut self) {
        if !self.sessions.is_empty() && !self.is_shut_down() {
            tracing::warn!(
                "Session pool dropped without shutdown, {} session(s) released unclosed",
                self.sessions.len()
            );
        }
    }
}
