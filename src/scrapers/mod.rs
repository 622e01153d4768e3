//! Site scrapers for rental platforms
//!
//! Each platform implements [`ListingSource`]: how to turn a search-result
//! page into raw listings, where the next page is, and how to clean a raw
//! listing into a [`Listing`]. Pagination and fetching are shared.

pub mod cleaning;
pub mod http;
pub mod jaap;
pub mod pararius;

use anyhow::Result;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::db::{Listing, Platform};

pub use http::HttpFetcher;
pub use jaap::JaapSource;
pub use pararius::ParariusSource;

/// A listing exactly as found on the page; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub title: Option<String>,
    pub url: Option<String>,
    pub address: Option<String>,
    pub price: Option<String>,
    pub specs: Option<String>,
    pub description: Option<String>,
    pub posted_at: Option<String>,
    pub fields: BTreeMap<String, String>,
}

/// One parsed search-result page
#[derive(Debug, Clone, Default)]
pub struct ScrapedPage {
    pub listings: Vec<RawListing>,
    /// Href of the next page, possibly relative to the current page
    pub next_page: Option<String>,
}

pub trait ListingSource {
    fn platform(&self) -> Platform;

    fn start_url(&self) -> &str;

    fn parse_page(&self, html: &str, page_url: &Url) -> Result<ScrapedPage>;

    /// Validate and normalize a raw listing. Fails with
    /// [`ScrapeError::MissingField`](crate::error::ScrapeError::MissingField)
    /// when URL, price or address is absent or unparseable.
    fn clean(&self, raw: &RawListing) -> Result<Listing>;

    /// Whether descriptions have to come from the listing's own page
    fn has_detail_pages(&self) -> bool {
        false
    }

    fn parse_detail(&self, _html: &str) -> Option<String> {
        None
    }
}

pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub max_pages: usize,
    /// Only scrape the first page
    pub debug: bool,
    pub request_delay: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            max_pages: 50,
            debug: false,
            request_delay: Duration::ZERO,
        }
    }
}

/// Everything collected from one platform. `error` is set when pagination
/// ended because a page could not be fetched or parsed, or when the first
/// page had no ads at all.
#[derive(Debug, Default)]
pub struct PaginationResult {
    pub listings: Vec<RawListing>,
    pub pages_fetched: usize,
    pub error: Option<String>,
}

/// Walk the search results of `source`, starting at its start URL and
/// following next-page links.
pub fn scrape_all_pages<F, S>(fetcher: &F, source: &S, options: &ScrapeOptions) -> PaginationResult
where
    F: PageFetcher + ?Sized,
    S: ListingSource + ?Sized,
{
    let platform = source.platform();
    let mut result = PaginationResult::default();

    let mut page_url = match Url::parse(source.start_url()) {
        Ok(url) => url,
        Err(e) => {
            result.error = Some(format!("invalid start URL '{}': {}", source.start_url(), e));
            return result;
        }
    };
    let mut visited: HashSet<String> = HashSet::new();

    loop {
        if !visited.insert(page_url.to_string()) {
            warn!("{}: page {} already visited, stopping", platform, page_url);
            break;
        }
        if result.pages_fetched > 0 && !options.request_delay.is_zero() {
            std::thread::sleep(options.request_delay);
        }

        info!("{}: fetching page {} ({})", platform, result.pages_fetched + 1, page_url);
        let html = match fetcher.fetch(page_url.as_str()) {
            Ok(html) => html,
            Err(e) => {
                warn!("{}: failed to fetch {}: {:#}", platform, page_url, e);
                result.error = Some(format!("{:#}", e));
                break;
            }
        };
        result.pages_fetched += 1;

        let page = match source.parse_page(&html, &page_url) {
            Ok(page) => page,
            Err(e) => {
                warn!("{}: failed to parse {}: {:#}", platform, page_url, e);
                result.error = Some(format!("{:#}", e));
                break;
            }
        };

        if page.listings.is_empty() {
            if result.pages_fetched == 1 {
                warn!("{}: no ads found on {}", platform, page_url);
                result.error = Some(format!("no ads found on {}", page_url));
            } else {
                info!("{}: no ads on {}, stopping", platform, page_url);
            }
            break;
        }
        debug!("{}: {} ads on page {}", platform, page.listings.len(), result.pages_fetched);
        result.listings.extend(page.listings);

        if options.debug {
            debug!("{}: debug mode, not following next page", platform);
            break;
        }
        if result.pages_fetched >= options.max_pages {
            info!("{}: reached max pages ({})", platform, options.max_pages);
            break;
        }

        let Some(next) = page.next_page else {
            debug!("{}: no next page link", platform);
            break;
        };
        page_url = match page_url.join(&next) {
            Ok(url) => url,
            Err(e) => {
                warn!("{}: invalid next page link '{}': {}", platform, next, e);
                result.error = Some(format!("invalid next page link '{}': {}", next, e));
                break;
            }
        };
    }

    info!(
        "{}: collected {} ads from {} page(s)",
        platform,
        result.listings.len(),
        result.pages_fetched
    );
    result
}

/// Clean raw listings, logging and counting the ones that fail
pub fn clean_all<S: ListingSource + ?Sized>(source: &S, raw: &[RawListing]) -> (Vec<Listing>, usize) {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for item in raw {
        match source.clean(item) {
            Ok(listing) => cleaned.push(listing),
            Err(e) => {
                skipped += 1;
                warn!(
                    "{}: skipping listing {:?}: {:#}",
                    source.platform(),
                    item.url.as_deref().or(item.title.as_deref()).unwrap_or("<unknown>"),
                    e
                );
            }
        }
    }
    (cleaned, skipped)
}
