//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small catalog and run the full
//! harvest cycle end-to-end through real HTTP sessions.

use async_trait::async_trait;
use catalog_harvester::config::{parse_config, Config};
use catalog_harvester::crawler::{
    harvest, harvest_with, HttpSessionFactory, ProxyEndpoint, RawResponse, Session,
    SessionFactory, SessionSettings, TransportError,
};
use catalog_harvester::output::UTF8_BOM;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a validated config harvesting `pages` listing pages from `base_url`
fn create_test_config(base_url: &str, pages: u32, csv_path: &Path, proxies: &[&str]) -> Config {
    let proxies = proxies
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(", ");

    let content = format!(
        r#"
[crawler]
concurrency = 4

[http]
total-timeout-secs = 5
connect-timeout-secs = 2
read-timeout-secs = 2
proxies = [{proxies}]

[retry]
max-attempts = 3
min-delay-ms = 1
max-delay-ms = 5
multiplier = 0.001

[listing]
first-page = "{base}/catalogue/index.html"
page-template = "{base}/catalogue/page-{{}}.html"
last-page-number = {pages}

[output]
csv-path = '{csv}'
include-url = true
"#,
        proxies = proxies,
        base = base_url,
        pages = pages,
        csv = csv_path.display(),
    );

    parse_config(&content).expect("Test config should be valid")
}

fn listing_body(books: &[&str]) -> String {
    let items: String = books
        .iter()
        .map(|slug| {
            format!(
                r#"<li><article class="product_pod"><h3><a href="{}/index.html">{}</a></h3></article></li>"#,
                slug, slug
            )
        })
        .collect();
    format!("<html><body><ol class=\"row\">{}</ol></body></html>", items)
}

fn detail_body(title: &str, price: &str) -> String {
    format!(
        r#"<html><body>
        <div class="col-sm-6 product_main"><h1>{}</h1><p class="price_color">{}</p></div>
        <div id="product_description" class="sub-header"><h2>Product Description</h2></div>
        <p>About {}</p>
        </body></html>"#,
        title, price, title
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Serves two listing pages with three books each
async fn mount_catalog(server: &MockServer, skip_detail: Option<&str>) {
    mount_page(
        server,
        "/catalogue/index.html",
        listing_body(&["a-light", "tipping", "soumission"]),
    )
    .await;
    mount_page(
        server,
        "/catalogue/page-2.html",
        listing_body(&["sharp-objects", "sapiens", "requiem"]),
    )
    .await;

    for (slug, price) in [
        ("a-light", "£51.77"),
        ("tipping", "£53.74"),
        ("soumission", "£50.10"),
        ("sharp-objects", "£47.82"),
        ("sapiens", "£54.23"),
        ("requiem", "£22.65"),
    ] {
        if Some(slug) == skip_detail {
            continue;
        }
        mount_page(
            server,
            &format!("/catalogue/{}/index.html", slug),
            detail_body(slug, price),
        )
        .await;
    }
}

fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let bytes = std::fs::read(path).expect("CSV should exist");
    assert!(bytes.starts_with(UTF8_BOM), "CSV should start with a byte order mark");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(&bytes[UTF8_BOM.len()..]);
    reader
        .records()
        .map(|row| row.unwrap().iter().map(str::to_string).collect())
        .collect()
}

struct CountingSession {
    inner: Arc<dyn Session>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Session for CountingSession {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        self.inner.get(url).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Real HTTP sessions that count how often they are closed
struct CountingFactory {
    inner: HttpSessionFactory,
    closes: Arc<AtomicUsize>,
}

impl CountingFactory {
    fn new(config: &Config) -> Self {
        let settings = SessionSettings::from_config(&config.http).unwrap();
        Self {
            inner: HttpSessionFactory::new(settings),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SessionFactory for CountingFactory {
    fn open(&self, endpoint: &ProxyEndpoint) -> Result<Arc<dyn Session>, TransportError> {
        let inner = self.inner.open(endpoint)?;
        Ok(Arc::new(CountingSession {
            inner,
            closes: Arc::clone(&self.closes),
        }))
    }
}

#[tokio::test]
async fn test_full_harvest_exports_every_record() {
    let server = MockServer::start().await;
    mount_catalog(&server, None).await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("books_data").join("books.csv");
    let config = create_test_config(&server.uri(), 2, &csv_path, &[]);
    let factory = CountingFactory::new(&config);

    let (report, export) = harvest_with(config, &factory).await.unwrap();

    assert_eq!(report.listing_pages, 2);
    assert_eq!(report.listing_fetched, 2);
    assert_eq!(report.discovered, 6);
    assert_eq!(report.collected(), 6);
    assert_eq!(export.written, 6);
    assert_eq!(factory.closes.load(Ordering::SeqCst), 1);

    let rows = read_csv(&csv_path);
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0], vec!["title", "price", "description", "url"]);
    assert_eq!(
        rows[1],
        vec![
            "a-light".to_string(),
            "£51.77".to_string(),
            "About a-light".to_string(),
            format!("{}/catalogue/a-light/index.html", server.uri()),
        ]
    );
    assert_eq!(rows[6][0], "requiem");
}

#[tokio::test]
async fn test_server_error_drops_one_record_without_retry() {
    let server = MockServer::start().await;
    mount_catalog(&server, Some("sapiens")).await;

    Mock::given(method("GET"))
        .and(path("/catalogue/sapiens/index.html"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("books.csv");
    let config = create_test_config(&server.uri(), 2, &csv_path, &[]);
    let factory = CountingFactory::new(&config);

    let (report, export) = harvest_with(config, &factory).await.unwrap();

    assert_eq!(report.discovered, 6);
    assert_eq!(report.collected(), 5);
    assert_eq!(report.lost(), 1);
    assert_eq!(export.written, 5);
    assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    assert!(report.records.iter().all(|r| r.title != "sapiens"));
}

#[tokio::test]
async fn test_missing_listing_page_is_skipped() {
    let server = MockServer::start().await;
    mount_catalog(&server, None).await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("books.csv");
    // Page 3 is not served and answers 404
    let config = create_test_config(&server.uri(), 3, &csv_path, &[]);
    let factory = CountingFactory::new(&config);

    let (report, _) = harvest_with(config, &factory).await.unwrap();

    assert_eq!(report.listing_pages, 3);
    assert_eq!(report.listing_fetched, 2);
    assert_eq!(report.collected(), 6);
}

#[tokio::test]
async fn test_missing_fields_use_placeholders() {
    let server = MockServer::start().await;
    mount_page(&server, "/catalogue/index.html", listing_body(&["bare"])).await;
    mount_page(
        &server,
        "/catalogue/bare/index.html",
        "<html><body><p>Nothing here</p></body></html>".to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("books.csv");
    let config = create_test_config(&server.uri(), 1, &csv_path, &[]);

    let (report, _) = harvest(config).await.unwrap();

    let record = &report.records[0];
    assert_eq!(record.title, catalog_harvester::crawler::UNTITLED);
    assert_eq!(record.price, catalog_harvester::crawler::UNPRICED);
    assert_eq!(record.description, catalog_harvester::crawler::NO_DESCRIPTION);
}

#[tokio::test]
async fn test_harvest_without_records_writes_no_file() {
    let server = MockServer::start().await;
    mount_page(&server, "/catalogue/index.html", listing_body(&[])).await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("books.csv");
    let config = create_test_config(&server.uri(), 1, &csv_path, &[]);

    let (report, export) = harvest(config).await.unwrap();

    assert_eq!(report.listing_fetched, 1);
    assert_eq!(report.collected(), 0);
    assert_eq!(export.written, 0);
    assert!(!csv_path.exists());
}

#[tokio::test]
async fn test_unreachable_proxy_loses_pages_but_run_completes() {
    let server = MockServer::start().await;
    mount_catalog(&server, None).await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("books.csv");
    // Nothing listens on port 1, every attempt through this proxy fails
    let config = create_test_config(&server.uri(), 2, &csv_path, &["http://127.0.0.1:1"]);
    let factory = CountingFactory::new(&config);

    let (report, export) = harvest_with(config, &factory).await.unwrap();

    assert_eq!(report.listing_fetched, 0);
    assert_eq!(report.discovered, 0);
    assert_eq!(export.written, 0);
    assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}
