//! HTML extraction of detail links and item records
//!
//! Extraction never fails: links that cannot be resolved are dropped and
//! fields that are missing from a page fall back to fixed placeholders.

use crate::config::ExtractorConfig;
use crate::HarvestError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Placeholder used when a page has no title
pub const UNTITLED: &str = "untitled";

/// Placeholder used when a page has no price
pub const UNPRICED: &str = "unpriced";

/// Placeholder used when a page has no description
pub const NO_DESCRIPTION: &str = "no description";

/// Fields extracted from one detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Detail page the record was extracted from
    pub url: String,
    pub title: String,
    pub price: String,
    pub description: String,
}

/// Compiled selectors for listing and detail pages
#[derive(Debug, Clone)]
pub struct Extractor {
    links: Selector,
    title: Selector,
    price: Selector,
    description: Selector,
}

impl Extractor {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - All selectors compiled
    /// * `Err(HarvestError::Selector)` - One of the selectors is not valid CSS
    pub fn new(config: &ExtractorConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            links: compile(&config.link_selector)?,
            title: compile(&config.title_selector)?,
            price: compile(&config.price_selector)?,
            description: compile(&config.description_selector)?,
        })
    }

    /// Extracts detail page links from a listing page
    ///
    /// Relative references are resolved against `base_url`. References that
    /// cannot be resolved, or that resolve to a non-HTTP(S) URL, are dropped.
    /// Links keep their document order.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_harvester::config::ExtractorConfig;
    /// use catalog_harvester::crawler::Extractor;
    /// use url::Url;
    ///
    /// let extractor = Extractor::new(&ExtractorConfig::default()).unwrap();
    /// let html = r#"<article class="product_pod"><h3><a href="../book_1/index.html">Book</a></h3></article>"#;
    /// let base = Url::parse("https://books.example.com/catalogue/page-2.html").unwrap();
    /// let links = extractor.extract_links(html, &base);
    /// assert_eq!(links, vec!["https://books.example.com/book_1/index.html"]);
    /// ```
    pub fn extract_links(&self, html: &str, base_url: &Url) -> Vec<String> {
        let document = Html::parse_document(html);

        document
            .select(&self.links)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| resolve_link(href, base_url))
            .collect()
    }

    /// Extracts a record from a detail page
    pub fn extract_record(&self, html: &str, url: &str) -> Record {
        let document = Html::parse_document(html);

        Record {
            url: url.to_string(),
            title: first_text(&document, &self.title).unwrap_or_else(|| UNTITLED.to_string()),
            price: first_text(&document, &self.price).unwrap_or_else(|| UNPRICED.to_string()),
            description: first_text(&document, &self.description)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        }
    }
}

fn compile(selector: &str) -> Result<Selector, HarvestError> {
    Selector::parse(selector).map_err(|e| HarvestError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Trimmed text of the first matching element, if it is not blank
fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: references
/// - fragment-only references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
