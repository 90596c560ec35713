use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub listing: ListingConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight across both crawl phases
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound on the whole run in seconds (0 disables the limit)
    #[serde(rename = "run-timeout-secs", default)]
    pub run_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            run_timeout_secs: 0,
        }
    }
}

/// Network session configuration shared by every proxy session
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Total time allowed for one request, body included
    #[serde(rename = "total-timeout-secs", default = "default_total_timeout")]
    pub total_timeout_secs: u64,

    /// Time allowed to establish the connection
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Time allowed between two reads on the socket
    #[serde(rename = "read-timeout-secs", default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Headers sent with every request
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Ordered proxy URLs; empty means a direct connection
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            total_timeout_secs: default_total_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            headers: default_headers(),
            proxies: Vec::new(),
        }
    }
}

/// Retry policy for transient transport failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per URL, the first one included
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the wait between attempts
    #[serde(rename = "min-delay-ms", default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound of the wait between attempts
    #[serde(rename = "max-delay-ms", default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Factor applied to the base-2 exponential (seconds)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

/// Listing page enumeration
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Explicit URL for the first page, when it differs from the template
    #[serde(rename = "first-page", default)]
    pub first_page: Option<String>,

    /// URL template where `{}` is replaced by the page number
    #[serde(rename = "page-template")]
    pub page_template: String,

    #[serde(rename = "first-page-number", default = "default_first_page_number")]
    pub first_page_number: u32,

    #[serde(rename = "last-page-number")]
    pub last_page_number: u32,
}

/// CSS selectors used to pull links and fields out of pages
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    #[serde(rename = "link-selector", default = "default_link_selector")]
    pub link_selector: String,

    #[serde(rename = "title-selector", default = "default_title_selector")]
    pub title_selector: String,

    #[serde(rename = "price-selector", default = "default_price_selector")]
    pub price_selector: String,

    #[serde(rename = "description-selector", default = "default_description_selector")]
    pub description_selector: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            link_selector: default_link_selector(),
            title_selector: default_title_selector(),
            price_selector: default_price_selector(),
            description_selector: default_description_selector(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the CSV file receiving the records
    #[serde(rename = "csv-path")]
    pub csv_path: String,

    /// Add the detail page URL as a fourth column
    #[serde(rename = "include-url", default)]
    pub include_url: bool,

    /// Optional log file, truncated at the start of every run
    #[serde(rename = "log-file", default)]
    pub log_file: Option<String>,
}

fn default_concurrency() -> usize {
    25
}

fn default_total_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    10
}

fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
        ),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_min_delay() -> u64 {
    2_000
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_first_page_number() -> u32 {
    1
}

fn default_link_selector() -> String {
    "article.product_pod h3 a[href]".to_string()
}

fn default_title_selector() -> String {
    "div.product_main h1".to_string()
}

fn default_price_selector() -> String {
    "div.product_main p.price_color".to_string()
}

fn default_description_selector() -> String {
    "#product_description ~ p".to_string()
}
