//! Network sessions
//!
//! A session is a long-lived HTTP client bound to a single egress path, either
//! a direct connection or one proxy. Sessions are shared behind `Arc` and issue
//! requests concurrently; connection reuse is left to the client's own pool.

use crate::config::HttpConfig;
use crate::crawler::pool::ProxyEndpoint;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Idle connections kept per host and per session
const MAX_IDLE_PER_HOST: usize = 6;

/// How long an idle keep-alive connection is held open
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Classification of transport-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection could not be established or was dropped while sending
    Connect,
    /// One of the total, connect or read timeouts fired
    Timeout,
    /// The response body could not be read to the end
    Body,
    /// The session was used after shutdown
    Closed,
    /// Anything else (invalid request, client construction, ...)
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Connect => "connection error",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Body => "body read error",
            TransportErrorKind::Closed => "session closed",
            TransportErrorKind::Other => "transport error",
        };
        f.write_str(label)
    }
}

/// Error raised by a session while issuing a request
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connection and timeout class failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect | TransportErrorKind::Timeout | TransportErrorKind::Body
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        // A connect timeout reports both is_connect and is_timeout
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() || error.is_request() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error.to_string())
    }
}

/// Status and body of a completed request
///
/// The body is only read for `200 OK`; it is empty for every other status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }
}

/// A reusable client bound to one egress path
#[async_trait]
pub trait Session: Send + Sync {
    /// Issues a single GET request
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;

    /// Releases the session's connections; later requests fail with `Closed`
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds sessions for the proxy pool
pub trait SessionFactory: Send + Sync {
    fn open(&self, endpoint: &ProxyEndpoint) -> Result<Arc<dyn Session>, TransportError>;
}

/// Settings shared by every session of a pool
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub headers: HeaderMap,
    pub total_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl SessionSettings {
    /// Builds session settings from the `[http]` configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::new(TransportErrorKind::Other, format!("{}: {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::new(TransportErrorKind::Other, format!("{}: {}", name, e))
            })?;
            headers.insert(name, value);
        }

        Ok(Self {
            headers,
            total_timeout: Duration::from_secs(config.total_timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
        })
    }
}

/// Session factory backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    settings: SessionSettings,
}

impl HttpSessionFactory {
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }

    /// Builds an HTTP client routed through the given endpoint
    ///
    /// Direct sessions ignore proxy environment variables so that the
    /// configured egress path is the only one ever used.
    pub fn build_client(&self, endpoint: &ProxyEndpoint) -> Result<Client, reqwest::Error> {
        let builder = Client::builder()
            .default_headers(self.settings.headers.clone())
            .timeout(self.settings.total_timeout)
            .connect_timeout(self.settings.connect_timeout)
            .read_timeout(self.settings.read_timeout)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(KEEPALIVE_TIMEOUT)
            .gzip(true)
            .brotli(true);

        let builder = match endpoint {
            ProxyEndpoint::Direct => builder.no_proxy(),
            ProxyEndpoint::Proxy(url) => builder.proxy(Proxy::all(url.as_str())?),
        };

        builder.build()
    }
}

impl SessionFactory for HttpSessionFactory {
    fn open(&self, endpoint: &ProxyEndpoint) -> Result<Arc<dyn Session>, TransportError> {
        let client = self.build_client(endpoint)?;
        Ok(Arc::new(HttpSession::new(client)))
    }
}

/// A `reqwest` client that can be shut down
pub struct HttpSession {
    client: RwLock<Option<Client>>,
}

impl HttpSession {
    pub fn new(client: Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        // Client is an Arc internally; cloning it keeps the lock short
        let client = self.client.read().await.clone().ok_or_else(|| {
            TransportError::new(TransportErrorKind::Closed, "session already shut down")
        })?;

        let response = client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Ok(RawResponse::status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(RawResponse::ok(body))
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self.client.write().await.take() {
            Some(_client) => Ok(()),
            None => Err(TransportError::new(
                TransportErrorKind::Closed,
                "session already shut down",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> SessionSettings {
        SessionSettings::from_config(&HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_settings_from_config() {
        let settings = settings();
        assert_eq!(settings.total_timeout, Duration::from_secs(30));
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.read_timeout, Duration::from_secs(10));
        assert!(settings.headers.contains_key("user-agent"));
    }

    #[test]
    fn test_build_direct_and_proxy_clients() {
        let factory = HttpSessionFactory::new(settings());
        assert!(factory.build_client(&ProxyEndpoint::Direct).is_ok());

        let proxy: ProxyEndpoint = "http://127.0.0.1:3128".parse().unwrap();
        assert!(factory.build_client(&proxy).is_ok());

        let socks: ProxyEndpoint = "socks5://127.0.0.1:1080".parse().unwrap();
        assert!(factory.build_client(&socks).is_ok());
    }

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::new(TransportErrorKind::Connect, "refused").is_transient());
        assert!(TransportError::new(TransportErrorKind::Timeout, "slow").is_transient());
        assert!(!TransportError::new(TransportErrorKind::Closed, "closed").is_transient());
        assert!(!TransportError::new(TransportErrorKind::Other, "bad").is_transient());
    }

    #[tokio::test]
    async fn test_http_session_reads_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/book"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(settings());
        let session = factory.open(&ProxyEndpoint::Direct).unwrap();
        let url = format!("{}/book", server.uri());
        let response = session.get(&url).await.unwrap();

        assert!(response.is_ok());
        assert_eq!(response.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_http_session_reports_status_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(settings());
        let session = factory.open(&ProxyEndpoint::Direct).unwrap();
        let url = format!("{}/gone", server.uri());
        let response = session.get(&url).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Bind then drop a listener to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let factory = HttpSessionFactory::new(settings());
        let session = factory.open(&ProxyEndpoint::Direct).unwrap();
        let error = session
            .get(&format!("http://{}/", address))
            .await
            .unwrap_err();

        assert!(error.is_transient(), "unexpected error kind: {}", error);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_requests() {
        let factory = HttpSessionFactory::new(settings());
        let session = factory.open(&ProxyEndpoint::Direct).unwrap();

        assert!(session.close().await.is_ok());
        assert!(session.close().await.is_err());

        let error = session.get("http://127.0.0.1:1/").await.unwrap_err();
        assert_eq!(error.kind, TransportErrorKind::Closed);
    }
}
