//! In-memory transport used by the crawler unit tests

use crate::crawler::pool::ProxyEndpoint;
use crate::crawler::session::{
    RawResponse, Session, SessionFactory, TransportError, TransportErrorKind,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = dyn Fn(&str) -> Result<RawResponse, TransportError> + Send + Sync;

/// Shared state behind every mock session of a pool
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    latency: Duration,
    fail_closes: AtomicBool,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub closes: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&str) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_latency(handler, Duration::ZERO)
    }

    pub fn with_latency(
        handler: impl Fn(&str) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            latency,
            fail_closes: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_closes(&self) {
        self.fail_closes.store(true, Ordering::SeqCst);
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

pub(crate) fn connect_error() -> TransportError {
    TransportError::new(TransportErrorKind::Connect, "connection refused")
}

struct MockSession {
    transport: Arc<MockTransport>,
}

#[async_trait]
impl Session for MockSession {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let t = &self.transport;
        t.calls.fetch_add(1, Ordering::SeqCst);
        t.requested.lock().unwrap().push(url.to_string());

        let now = t.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        t.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !t.latency.is_zero() {
            tokio::time::sleep(t.latency).await;
        } else {
            tokio::task::yield_now().await;
        }
        t.in_flight.fetch_sub(1, Ordering::SeqCst);

        (t.handler)(url)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.transport.closes.fetch_add(1, Ordering::SeqCst);
        if self.transport.fail_closes.load(Ordering::SeqCst) {
            return Err(TransportError::new(TransportErrorKind::Other, "close failed"));
        }
        Ok(())
    }
}

/// Factory handing out sessions that all share one `MockTransport`
pub(crate) struct MockFactory {
    transport: Arc<MockTransport>,
    failing: Vec<ProxyEndpoint>,
    fail_all: bool,
    opened: AtomicUsize,
}

impl MockFactory {
    pub fn new(transport: Arc<MockTransport>) -> Self {
        Self {
            transport,
            failing: Vec::new(),
            fail_all: false,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, endpoints: Vec<ProxyEndpoint>) -> Self {
        self.failing = endpoints;
        self
    }

    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SessionFactory for MockFactory {
    fn open(&self, endpoint: &ProxyEndpoint) -> Result<Arc<dyn Session>, TransportError> {
        if self.fail_all || self.failing.contains(endpoint) {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                format!("cannot reach {}", endpoint),
            ));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession {
            transport: Arc::clone(&self.transport),
        }))
    }
}
