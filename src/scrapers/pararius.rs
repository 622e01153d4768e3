use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::BTreeMap;
use url::Url;

use super::cleaning::{
    external_id_from_url, first_attr, first_number, first_text, normalize_whitespace, parse_posting_date,
    parse_price, require, selector, strip_new_badge,
};
use super::{ListingSource, RawListing, ScrapedPage};
use crate::db::{Listing, Platform};
use crate::error::ScrapeError;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"woonopp\. ([0-9]+)").expect("valid regex"));
static SIZE_M2_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+) m²").expect("valid regex"));
static ROOMS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"kamers ([0-9]+)").expect("valid regex"));
static ROOMS_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+) kamers?").expect("valid regex"));
static BUILD_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bouwjaar:? ([0-9]{4})").expect("valid regex"));

/// pararius.nl search results
pub struct ParariusSource {
    start_url: String,
}

impl ParariusSource {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
        }
    }
}

impl ListingSource for ParariusSource {
    fn platform(&self) -> Platform {
        Platform::Pararius
    }

    fn start_url(&self) -> &str {
        &self.start_url
    }

    fn parse_page(&self, html: &str, page_url: &Url) -> Result<ScrapedPage> {
        let document = Html::parse_document(html);
        let item_sel = selector("section.listing-search-item")?;
        let fallback_item_sel = selector("li.search-list__item--listing")?;
        let title_sel = selector("a.listing-search-item__link--title")?;
        let address_sel =
            selector(".listing-search-item__sub-title, .listing-search-item__location")?;
        let price_sel = selector(".listing-search-item__price")?;
        let features_sel =
            selector(".illustrated-features, .listing-search-item__features")?;
        let feature_item_sel = selector("li")?;
        let description_sel = selector(".listing-search-item__description")?;
        let date_sel = selector("time[datetime]")?;
        let next_sel = selector("a.pagination__link--next")?;

        let mut items: Vec<_> = document.select(&item_sel).collect();
        if items.is_empty() {
            items = document.select(&fallback_item_sel).collect();
        }

        let listings = items
            .iter()
            .map(|item| {
                let mut fields = BTreeMap::new();
                if let Some(features) = item.select(&features_sel).next() {
                    for feature in features.select(&feature_item_sel) {
                        let text = normalize_whitespace(&feature.text().collect::<Vec<_>>().join(" "));
                        let key = feature
                            .value()
                            .classes()
                            .find_map(|class| class.strip_prefix("illustrated-features__item--"));
                        if let Some(key) = key.filter(|_| !text.is_empty()) {
                            fields.insert(key.to_string(), text);
                        }
                    }
                }

                RawListing {
                    title: first_text(item, &title_sel),
                    url: first_attr(item, &title_sel, "href")
                        .and_then(|href| page_url.join(&href).ok())
                        .map(|url| url.to_string()),
                    address: first_text(item, &address_sel),
                    price: first_text(item, &price_sel),
                    specs: first_text(item, &features_sel),
                    description: first_text(item, &description_sel),
                    posted_at: first_attr(item, &date_sel, "datetime"),
                    fields,
                }
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
        let url = require(raw.url.as_ref(), "url")?;
        let external_id = external_id_from_url(url).ok_or(ScrapeError::MissingField("url"))?;
        let price = parse_price(require(raw.price.as_ref(), "price")?)
            .ok_or(ScrapeError::MissingField("price"))?;
        let address = strip_new_badge(require(raw.address.as_ref(), "address")?);
        if address.is_empty() {
            return Err(ScrapeError::MissingField("address").into());
        }

        let specs = raw.specs.as_deref().unwrap_or_default();
        let mut extra = raw.fields.clone();
        if !specs.is_empty() {
            extra.insert("specs".to_string(), specs.to_string());
        }

        Ok(Listing {
            platform: Platform::Pararius,
            external_id,
            url: url.to_string(),
            title: raw.title.clone().unwrap_or_else(|| address.clone()),
            address,
            price,
            size_m2: first_number(&[&SIZE_RE, &SIZE_M2_RE], specs),
            rooms: first_number(&[&ROOMS_SUFFIX_RE, &ROOMS_RE], specs),
            build_year: first_number(&[&BUILD_YEAR_RE], specs)
                .or_else(|| raw.fields.get("construction-period").and_then(|y| y.parse().ok())),
            posted_at: raw.posted_at.as_deref().and_then(parse_posting_date),
            description: raw.description.clone(),
            raw: extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const PAGE: &str = r#"
    <html><body><ul class="search-list">
      <li class="search-list__item search-list__item--listing">
        <section class="listing-search-item listing-search-item--list listing-search-item--for-rent">
          <h2><a class="listing-search-item__link listing-search-item__link--title"
                 href="/appartement-te-huur/utrecht/5a1b2c3d/biltstraat?ref=search">Appartement Biltstraat</a></h2>
          <div class="listing-search-item__sub-title">Nieuw 3572 AB Utrecht (Wittevrouwen)</div>
          <div class="listing-search-item__price">€ 1.450 per maand</div>
          <ul class="illustrated-features illustrated-features--compact">
            <li class="illustrated-features__item illustrated-features__item--surface-area">70 m²</li>
            <li class="illustrated-features__item illustrated-features__item--number-of-rooms">3 kamers</li>
            <li class="illustrated-features__item illustrated-features__item--construction-period">1932</li>
          </ul>
        </section>
      </li>
      <li class="search-list__item search-list__item--listing">
        <section class="listing-search-item listing-search-item--list">
          <h2><a class="listing-search-item__link listing-search-item__link--title"
                 href="/huis-te-huur/utrecht/9f8e7d6c/lauwerecht">Huis Lauwerecht</a></h2>
          <div class="listing-search-item__sub-title">3514 GR Utrecht (Lauwerecht)</div>
          <div class="listing-search-item__price">Prijs op aanvraag</div>
        </section>
      </li>
    </ul>
    <a class="pagination__link pagination__link--next" href="/huurwoningen/utrecht/page-2">Volgende</a>
    </body></html>"#;

    fn page_url() -> Url {
        Url::parse("https://www.pararius.nl/huurwoningen/utrecht/").unwrap()
    }

    #[test]
    fn parses_ads_and_next_link() {
        let source = ParariusSource::new("https://www.pararius.nl/huurwoningen/utrecht/");
        let page = source.parse_page(PAGE, &page_url()).unwrap();

        assert_eq!(page.listings.len(), 2);
        assert_eq!(page.next_page.as_deref(), Some("/huurwoningen/utrecht/page-2"));

        let first = &page.listings[0];
        assert_eq!(first.title.as_deref(), Some("Appartement Biltstraat"));
        assert_eq!(
            first.url.as_deref(),
            Some("https://www.pararius.nl/appartement-te-huur/utrecht/5a1b2c3d/biltstraat?ref=search")
        );
        assert_eq!(first.fields.get("surface-area").map(String::as_str), Some("70 m²"));
    }

    #[test]
    fn cleans_listing() {
        let source = ParariusSource::new("https://www.pararius.nl/huurwoningen/utrecht/");
        let page = source.parse_page(PAGE, &page_url()).unwrap();
        let listing = source.clean(&page.listings[0]).unwrap();

        assert_eq!(listing.external_id, "/appartement-te-huur/utrecht/5a1b2c3d/biltstraat");
        assert_eq!(listing.address, "3572 AB Utrecht (Wittevrouwen)");
        assert_eq!(listing.price, dec!(1450));
        assert_eq!(listing.size_m2, Some(70));
        assert_eq!(listing.rooms, Some(3));
        assert_eq!(listing.build_year, Some(1932));
    }

    #[test]
    fn old_feature_text_is_understood() {
        let source = ParariusSource::new("https://www.pararius.nl/huurwoningen/utrecht/");
        let raw = RawListing {
            url: Some("https://www.pararius.nl/appartement-te-huur/utrecht/1/a".into()),
            address: Some("3581 KL Utrecht".into()),
            price: Some("€ 1.100 per maand".into()),
            specs: Some("woonopp. 55 m² kamers 2 bouwjaar 1998".into()),
            ..RawListing::default()
        };
        let listing = source.clean(&raw).unwrap();
        assert_eq!(listing.size_m2, Some(55));
        assert_eq!(listing.rooms, Some(2));
        assert_eq!(listing.build_year, Some(1998));
        assert_eq!(listing.title, "3581 KL Utrecht");
    }

    #[test]
    fn price_on_request_is_rejected() {
        let source = ParariusSource::new("https://www.pararius.nl/huurwoningen/utrecht/");
        let page = source.parse_page(PAGE, &page_url()).unwrap();
        let err = source.clean(&page.listings[1]).unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn missing_address_is_rejected() {
        let source = ParariusSource::new("https://www.pararius.nl/huurwoningen/utrecht/");
        let raw = RawListing {
            url: Some("https://www.pararius.nl/x".into()),
            price: Some("€ 900 per maand".into()),
            ..RawListing::default()
        };
        let err = source.clean(&raw).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::MissingField("address"))
        ));
    }

    #[test]
    fn page_without_ads_is_empty() {
        let source = ParariusSource::new("https://www.pararius.nl/huurwoningen/utrecht/");
        let page = source
            .parse_page("<html><body><p>Geen resultaten</p></body></html>", &page_url())
            .unwrap();
        assert!(page.listings.is_empty());
        assert!(page.next_page.is_none());
    }
}
