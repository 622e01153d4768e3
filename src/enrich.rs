//! Geographic and price enrichment of cleaned listings

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};

use crate::db::{EnrichedListing, Listing};
use crate::geo::{nearest_poi, GeoQuery, Geocoder, PointOfInterest};

/// Monthly rent per square meter, rounded to cents
pub fn price_per_m2(price: Decimal, size_m2: Option<u32>) -> Option<Decimal> {
    let size = size_m2.filter(|s| *s > 0)?;
    Some(
        (price / Decimal::from(size)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    )
}

pub struct Enricher<G> {
    geocoder: G,
    pois: Vec<PointOfInterest>,
    country: String,
    show_progress: bool,
    geocode_failures: usize,
}

impl<G: Geocoder> Enricher<G> {
    pub fn new(geocoder: G, pois: Vec<PointOfInterest>, country: impl Into<String>) -> Self {
        Self {
            geocoder,
            pois,
            country: country.into(),
            show_progress: false,
            geocode_failures: 0,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Addresses that could not be resolved so far
    pub fn geocode_failures(&self) -> usize {
        self.geocode_failures
    }

    pub fn into_geocoder(self) -> G {
        self.geocoder
    }

    /// Add coordinates, nearest POI and price per m². Never fails: lookup
    /// errors only leave the geographic fields empty.
    pub fn enrich(&mut self, listing: Listing, scraped_at: DateTime<Utc>) -> EnrichedListing {
        let coordinates = match GeoQuery::from_address(&listing.address, &self.country) {
            Some(query) => match self.geocoder.geocode(&query) {
                Ok(Some(coords)) => Some(coords),
                Ok(None) => {
                    warn!("No location found for '{}'", listing.address);
                    self.geocode_failures += 1;
                    None
                }
                Err(e) => {
                    warn!("Geocoding '{}' failed: {:#}", listing.address, e);
                    self.geocode_failures += 1;
                    None
                }
            },
            None => {
                debug!("Nothing to geocode in address '{}'", listing.address);
                self.geocode_failures += 1;
                None
            }
        };

        let nearest = coordinates.and_then(|coords| nearest_poi(coords, &self.pois));
        let price_per_m2 = price_per_m2(listing.price, listing.size_m2);

        EnrichedListing {
            listing,
            coordinates,
            nearest_poi: nearest,
            price_per_m2,
            scraped_at,
        }
    }

    pub fn enrich_all(
        &mut self,
        listings: Vec<Listing>,
        scraped_at: DateTime<Utc>,
    ) -> Vec<EnrichedListing> {
        let bar = if self.show_progress {
            let bar = ProgressBar::new(listings.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar.set_message("Geocoding");
            bar
        } else {
            ProgressBar::hidden()
        };

        let enriched = listings
            .into_iter()
            .map(|listing| {
                let item = self.enrich(listing, scraped_at);
                bar.inc(1);
                item
            })
            .collect();
        bar.finish_and_clear();
        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Platform;
    use crate::geo::Coordinates;
    use anyhow::{anyhow, Result};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    /// Resolves postal-code queries to a fixed point, fails on free text
    struct StubGeocoder;

    impl Geocoder for StubGeocoder {
        fn geocode(&mut self, query: &GeoQuery) -> Result<Option<Coordinates>> {
            match query {
                GeoQuery::PostalCode { code, .. } if code == "3511CE" => {
                    Ok(Some(Coordinates::new(52.0894, 5.1101)))
                }
                GeoQuery::PostalCode { .. } => Ok(Some(Coordinates::new(52.1000, 5.1400))),
                GeoQuery::FreeText(_) => Err(anyhow!("service unavailable")),
            }
        }
    }

    fn listing(address: &str, size_m2: Option<u32>) -> Listing {
        Listing {
            platform: Platform::Jaap,
            external_id: format!("/{}", address),
            url: "https://www.jaap.nl/x".into(),
            title: address.into(),
            address: address.into(),
            price: dec!(1450),
            size_m2,
            rooms: Some(3),
            build_year: None,
            posted_at: None,
            description: None,
            raw: BTreeMap::new(),
        }
    }

    fn enricher() -> Enricher<StubGeocoder> {
        Enricher::new(
            StubGeocoder,
            vec![PointOfInterest {
                name: "Utrecht Centraal".into(),
                coordinates: Coordinates::new(52.0894, 5.1101),
            }],
            "Netherlands",
        )
    }

    #[test]
    fn price_per_m2_rounds_to_cents() {
        assert_eq!(price_per_m2(dec!(1450), Some(70)), Some(dec!(20.71)));
        assert_eq!(price_per_m2(dec!(1000), Some(0)), None);
        assert_eq!(price_per_m2(dec!(1000), None), None);
    }

    #[test]
    fn enriches_with_distance() {
        let mut enricher = enricher();
        let result = enricher.enrich(listing("Stationsplein 1, 3511 CE Utrecht", Some(70)), Utc::now());
        let poi = result.nearest_poi.unwrap();
        assert_eq!(poi.name, "Utrecht Centraal");
        assert!(poi.distance_km.abs() < 1e-9);
        assert_eq!(result.price_per_m2, Some(dec!(20.71)));
    }

    #[test]
    fn farther_address_is_farther() {
        let mut enricher = enricher();
        let near = enricher.enrich(listing("3511 CE Utrecht", None), Utc::now());
        let far = enricher.enrich(listing("3584 AA Utrecht", None), Utc::now());
        assert!(
            far.nearest_poi.unwrap().distance_km > near.nearest_poi.unwrap().distance_km
        );
    }

    #[test]
    fn geocoder_error_leaves_distance_empty() {
        let mut enricher = enricher();
        let result = enricher.enrich(listing("Appartement Oudegracht", Some(50)), Utc::now());
        assert!(result.coordinates.is_none());
        assert!(result.nearest_poi.is_none());
        assert_eq!(result.price_per_m2, Some(dec!(29.00)));
        assert_eq!(enricher.geocode_failures(), 1);
    }

    #[test]
    fn enrich_all_keeps_order_and_count() {
        let mut enricher = enricher();
        let items = enricher.enrich_all(
            vec![listing("3511 CE Utrecht", None), listing("Oudegracht", None)],
            Utc::now(),
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].listing.address, "3511 CE Utrecht");
        assert!(items[1].coordinates.is_none());
    }
}
