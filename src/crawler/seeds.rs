//! Listing page enumeration
//!
//! The listing URLs are known before the crawl starts: one per page number in
//! the configured range, built from the page template.

use crate::config::ListingConfig;

/// Placeholder replaced by the page number in the template
const PAGE_PLACEHOLDER: &str = "{}";

/// Builds the listing page URLs in page order
///
/// When `first_page` is set it is used for `first_page_number` in place of the
/// template (catalogs often serve page 1 as `index.html`).
///
/// # Example
///
/// ```
/// use catalog_harvester::config::ListingConfig;
/// use catalog_harvester::crawler::listing_urls;
///
/// let config = ListingConfig {
///     first_page: Some("https://books.example.com/index.html".to_string()),
///     page_template: "https://books.example.com/page-{}.html".to_string(),
///     first_page_number: 1,
///     last_page_number: 3,
/// };
/// assert_eq!(
///     listing_urls(&config),
///     vec![
///         "https://books.example.com/index.html",
///         "https://books.example.com/page-2.html",
///         "https://books.example.com/page-3.html",
///     ]
/// );
/// ```
pub fn listing_urls(config: &ListingConfig) -> Vec<String> {
    (config.first_page_number..=config.last_page_number)
        .map(|page| match &config.first_page {
            Some(first) if page == config.first_page_number => first.clone(),
            _ => config
                .page_template
                .replace(PAGE_PLACEHOLDER, &page.to_string()),
        })
        .collect()
}
