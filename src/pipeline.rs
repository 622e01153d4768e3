//! Scrape → clean → enrich → store, one platform at a time

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{Config, PlatformsConfig};
use crate::db::{self, Platform, RunCounters};
use crate::enrich::Enricher;
use crate::error::ScrapeError;
use crate::filter::ListingFilter;
use crate::geo::Geocoder;
use crate::scrapers::{
    self, JaapSource, ListingSource, PageFetcher, ParariusSource, ScrapeOptions,
};

/// Platforms to scrape for the given flags. Without any flag every platform
/// is scraped.
pub fn select_platforms(scrape_all: bool, jaap: bool, pararius: bool) -> Vec<Platform> {
    if scrape_all || (!jaap && !pararius) {
        return Platform::ALL.to_vec();
    }
    Platform::ALL
        .into_iter()
        .filter(|p| match p {
            Platform::Jaap => jaap,
            Platform::Pararius => pararius,
        })
        .collect()
}

pub fn source_for(platform: Platform, platforms: &PlatformsConfig) -> Box<dyn ListingSource> {
    let start_url = platforms.start_url(platform).to_string();
    match platform {
        Platform::Pararius => Box::new(ParariusSource::new(start_url)),
        Platform::Jaap => Box::new(JaapSource::new(start_url)),
    }
}

/// Outcome of one platform scrape
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub platform: Platform,
    pub run_id: i64,
    pub pages_fetched: usize,
    pub listings_seen: usize,
    pub listings_stored: usize,
    pub listings_new: usize,
    pub listings_skipped: usize,
    pub geocode_failures: usize,
    pub descriptions_fetched: usize,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Pipeline<'a, F, G> {
    conn: &'a Connection,
    config: &'a Config,
    fetcher: F,
    enricher: Enricher<G>,
    debug: bool,
}

impl<'a, F: PageFetcher, G: Geocoder> Pipeline<'a, F, G> {
    pub fn new(conn: &'a Connection, config: &'a Config, fetcher: F, geocoder: G) -> Self {
        let enricher = Enricher::new(
            geocoder,
            config.points_of_interest(),
            config.geocoder.country.clone(),
        );
        Self {
            conn,
            config,
            fetcher,
            enricher,
            debug: false,
        }
    }

    /// Only scrape the first result page of each platform
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.enricher = self.enricher.with_progress(show);
        self
    }

    /// Run every selected platform. Fetch and parse problems are recorded in
    /// the summaries; only database failures abort.
    pub fn run(&mut self, platforms: &[Platform]) -> Result<Vec<RunSummary>> {
        let mut summaries = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            let source = source_for(platform, &self.config.platforms);
            let summary = self.run_platform(source.as_ref())?;
            if let Some(err) = &summary.error {
                error!("{} scrape ended early: {}", platform, err);
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }

    pub fn run_platform(&mut self, source: &dyn ListingSource) -> Result<RunSummary> {
        let platform = source.platform();
        let started_at = Utc::now();
        let run_id = db::start_scrape_run(self.conn, platform, started_at)?;
        info!("Scraping {} (run {})", platform, run_id);

        let options = ScrapeOptions {
            max_pages: self.config.scrape.max_pages,
            debug: self.debug,
            request_delay: Duration::from_millis(self.config.scrape.request_delay_ms),
        };
        let pages = scrapers::scrape_all_pages(&self.fetcher, source, &options);

        let (cleaned, skipped) = scrapers::clean_all(source, &pages.listings);
        let mut seen_ids = HashSet::new();
        let unique: Vec<_> = cleaned
            .into_iter()
            .filter(|listing| seen_ids.insert(listing.external_id.clone()))
            .collect();

        let failures_before = self.enricher.geocode_failures();
        let enriched = self.enricher.enrich_all(unique, started_at);
        let geocode_failures = self.enricher.geocode_failures() - failures_before;

        let mut summary = RunSummary {
            platform,
            run_id,
            pages_fetched: pages.pages_fetched,
            listings_seen: pages.listings.len(),
            listings_stored: 0,
            listings_new: 0,
            listings_skipped: skipped,
            geocode_failures,
            descriptions_fetched: 0,
            error: pages.error,
        };

        let stats = match db::upsert_listings(self.conn, &enriched) {
            Ok(stats) => stats,
            Err(e) => {
                let message = format!("{:#}", e);
                self.finish(&summary, Some(&message))?;
                return Err(ScrapeError::Db(message).into());
            }
        };
        summary.listings_stored = stats.total();
        summary.listings_new = stats.inserted;

        if self.config.scrape.fetch_descriptions {
            match self.fetch_descriptions(source) {
                Ok(fetched) => summary.descriptions_fetched = fetched,
                Err(e) => {
                    let message = format!("{:#}", e);
                    self.finish(&summary, Some(&message))?;
                    return Err(ScrapeError::Db(message).into());
                }
            }
        }

        self.finish(&summary, summary.error.as_deref())?;
        info!(
            "{}: {} seen, {} stored ({} new), {} skipped",
            platform,
            summary.listings_seen,
            summary.listings_stored,
            summary.listings_new,
            summary.listings_skipped
        );
        Ok(summary)
    }

    fn finish(&self, summary: &RunSummary, error: Option<&str>) -> Result<()> {
        let counters = RunCounters {
            pages_fetched: summary.pages_fetched,
            listings_seen: summary.listings_seen,
            listings_stored: summary.listings_stored,
            listings_skipped: summary.listings_skipped,
        };
        db::finish_scrape_run(self.conn, summary.run_id, Utc::now(), &counters, error)
    }

    /// Fill in detail-page descriptions for stored listings that pass the
    /// filter and don't have one yet. Only platforms with a detail parser
    /// are touched.
    fn fetch_descriptions(&self, source: &dyn ListingSource) -> Result<usize> {
        if !source.has_detail_pages() {
            return Ok(0);
        }
        let platform = source.platform();

        let filter = ListingFilter {
            platform: Some(platform),
            ..ListingFilter::from(&self.config.filter)
        };
        let missing: Vec<_> = filter
            .apply(db::list_listings(self.conn, Some(platform))?)
            .into_iter()
            .filter(|listing| listing.description.is_none())
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }
        info!("{}: fetching {} descriptions", platform, missing.len());

        let base_delay = self.config.scrape.detail_delay_ms;
        let mut fetched = 0;
        for listing in &missing {
            let jitter = rand::thread_rng().gen_range(0..=base_delay);
            std::thread::sleep(Duration::from_millis(base_delay + jitter));

            let html = match self.fetcher.fetch(&listing.url) {
                Ok(html) => html,
                Err(e) => {
                    warn!("Failed to fetch details for {}: {:#}", listing.url, e);
                    continue;
                }
            };
            match source.parse_detail(&html) {
                Some(description) => {
                    db::set_description(self.conn, listing.id, &description)?;
                    fetched += 1;
                }
                None => debug!("No description on {}", listing.url),
            }
        }
        Ok(fetched)
    }
}
