use crate::config::types::{
    Config, CrawlerConfig, ExtractorConfig, HttpConfig, ListingConfig, OutputConfig, RetryConfig,
};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use scraper::Selector;
use url::Url;

/// Proxy schemes the HTTP client knows how to tunnel through
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

const MAX_CONCURRENCY: usize = 500;

/// Upper bound on the number of listing pages enumerated for one run
const MAX_LISTING_PAGES: u64 = 10_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_retry_config(&config.retry)?;
    validate_listing_config(&config.listing)?;
    validate_extractor_config(&config.extractor)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.total_timeout_secs == 0
        || config.connect_timeout_secs == 0
        || config.read_timeout_secs == 0
    {
        return Err(ConfigError::Validation(
            "timeouts must be at least 1 second".to_string(),
        ));
    }

    if config.connect_timeout_secs > config.total_timeout_secs
        || config.read_timeout_secs > config.total_timeout_secs
    {
        return Err(ConfigError::Validation(format!(
            "connect ({}s) and read ({}s) timeouts cannot exceed the total timeout ({}s)",
            config.connect_timeout_secs, config.read_timeout_secs, config.total_timeout_secs
        )));
    }

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }

    for proxy in &config.proxies {
        validate_proxy_url(proxy)?;
    }

    Ok(())
}

fn validate_proxy_url(proxy: &str) -> Result<(), ConfigError> {
    if proxy.trim().eq_ignore_ascii_case("direct") {
        return Ok(());
    }

    let url = Url::parse(proxy)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy URL '{}': {}", proxy, e)))?;

    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::Validation(format!(
            "Proxy '{}' uses unsupported scheme '{}' (expected one of {})",
            proxy,
            url.scheme(),
            PROXY_SCHEMES.join(", ")
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Proxy URL '{}' has no host",
            proxy
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if !config.multiplier.is_finite() || config.multiplier <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "multiplier must be a positive number, got {}",
            config.multiplier
        )));
    }

    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    if !config.page_template.contains("{}") {
        return Err(ConfigError::Validation(format!(
            "page_template '{}' must contain a '{{}}' page placeholder",
            config.page_template
        )));
    }

    validate_http_url(&config.page_template.replace("{}", "1"), "page_template")?;

    if let Some(first_page) = &config.first_page {
        validate_http_url(first_page, "first_page")?;
    }

    if config.first_page_number > config.last_page_number {
        return Err(ConfigError::Validation(format!(
            "first_page_number ({}) cannot exceed last_page_number ({})",
            config.first_page_number, config.last_page_number
        )));
    }

    let pages = u64::from(config.last_page_number) - u64::from(config.first_page_number) + 1;
    if pages > MAX_LISTING_PAGES {
        return Err(ConfigError::Validation(format!(
            "page range {}..={} spans {} pages, at most {} are allowed",
            config.first_page_number, config.last_page_number, pages, MAX_LISTING_PAGES
        )));
    }

    Ok(())
}

fn validate_http_url(candidate: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(candidate)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, candidate, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, candidate
        )));
    }

    Ok(())
}

fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    for (field, selector) in [
        ("link_selector", &config.link_selector),
        ("title_selector", &config.title_selector),
        ("price_selector", &config.price_selector),
        ("description_selector", &config.description_selector),
    ] {
        Selector::parse(selector).map_err(|e| {
            ConfigError::Validation(format!("Invalid {} '{}': {}", field, selector, e))
        })?;
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_path.is_empty() {
        return Err(ConfigError::Validation(
            "csv_path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.log_file, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "log_file cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}
