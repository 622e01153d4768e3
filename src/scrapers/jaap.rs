use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

use super::cleaning::{
    capture_number, external_id_from_url, first_attr, first_text, normalize_whitespace,
    parse_posting_date, parse_price, require, selector, strip_query,
};
use super::{ListingSource, RawListing, ScrapedPage};
use crate::db::{Listing, Platform};
use crate::error::ScrapeError;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+) m²").expect("valid regex"));
static ROOMS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+) kamers?").expect("valid regex"));

/// Jaap lists a bare city name for some ads; the street is then only in the title
const CITY_ONLY_ADDRESS: &str = "Utrecht";

/// jaap.nl search results
pub struct JaapSource {
    start_url: String,
}

impl JaapSource {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
        }
    }
}

impl ListingSource for JaapSource {
    fn platform(&self) -> Platform {
        Platform::Jaap
    }

    fn start_url(&self) -> &str {
        &self.start_url
    }

    fn parse_page(&self, html: &str, page_url: &Url) -> Result<ScrapedPage> {
        let document = Html::parse_document(html);
        let item_sel = selector(".property")?;
        let title_sel = selector(".property-address-street")?;
        let link_sel = selector("a.property-inner")?;
        let address_sel = selector(".property-address-zipcity")?;
        let price_sel = selector(".property-price")?;
        let features_sel = selector(".property-features")?;
        let date_sel = selector("time[datetime]")?;
        let next_sel = selector("a.navigation-button[rel=next]")?;

        let listings = document
            .select(&item_sel)
            .map(|item| RawListing {
                title: first_text(&item, &title_sel),
                url: first_attr(&item, &link_sel, "href")
                    .and_then(|href| page_url.join(strip_query(&href)).ok())
                    .map(|url| url.to_string()),
                address: first_text(&item, &address_sel),
                price: first_text(&item, &price_sel),
                specs: first_text(&item, &features_sel),
                description: None,
                posted_at: first_attr(&item, &date_sel, "datetime"),
                fields: Default::default(),
            })
            .collect();

        let next_page = document
            .select(&next_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        Ok(ScrapedPage {
            listings,
            next_page,
        })
    }

    fn clean(&self, raw: &RawListing) -> Result<Listing> {
        let url = strip_query(require(raw.url.as_ref(), "url")?);
        let external_id = external_id_from_url(url).ok_or(ScrapeError::MissingField("url"))?;
        let price = parse_price(require(raw.price.as_ref(), "price")?)
            .ok_or(ScrapeError::MissingField("price"))?;

        let title = raw.title.as_deref().map(str::trim).unwrap_or_default();
        let address = require(raw.address.as_ref(), "address")?;
        let address = if address.eq_ignore_ascii_case(CITY_ONLY_ADDRESS) && !title.is_empty() {
            title.to_string()
        } else {
            address.to_string()
        };

        let specs = raw.specs.as_deref().unwrap_or_default();
        let mut extra = raw.fields.clone();
        if !specs.is_empty() {
            extra.insert("specs".to_string(), specs.to_string());
        }

        Ok(Listing {
            platform: Platform::Jaap,
            external_id,
            url: url.to_string(),
            title: if title.is_empty() {
                address.clone()
            } else {
                title.to_string()
            },
            address,
            price,
            size_m2: capture_number(&SIZE_RE, specs),
            rooms: capture_number(&ROOMS_RE, specs),
            build_year: None,
            posted_at: raw.posted_at.as_deref().and_then(parse_posting_date),
            description: raw.description.clone(),
            raw: extra,
        })
    }

    fn has_detail_pages(&self) -> bool {
        true
    }

    fn parse_detail(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let description_sel = selector(".short-description").ok()?;
        document
            .select(&description_sel)
            .next()
            .map(|node| normalize_whitespace(&node.text().collect::<Vec<_>>().join(" ")))
            .filter(|text| !text.is_empty())
    }
}
