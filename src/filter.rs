//! Selection of interesting listings

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::FilterConfig;
use crate::db::{Platform, StoredListing};

/// Listing criteria; `None` means unconstrained. A listing lacking a field
/// that is constrained never matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingFilter {
    pub max_price: Option<Decimal>,
    pub min_rooms: Option<u32>,
    pub min_size_m2: Option<u32>,
    pub max_distance_km: Option<f64>,
    pub platform: Option<Platform>,
}

impl From<&FilterConfig> for ListingFilter {
    fn from(config: &FilterConfig) -> Self {
        Self {
            max_price: config.max_price.map(Decimal::from),
            min_rooms: config.min_rooms,
            min_size_m2: config.min_size_m2,
            max_distance_km: config.max_distance_km,
            platform: None,
        }
    }
}

impl ListingFilter {
    /// Filter that lets everything through
    pub fn none() -> Self {
        Self::default()
    }

    pub fn matches(&self, listing: &StoredListing) -> bool {
        if let Some(platform) = self.platform {
            if listing.platform != platform {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if listing.price > max_price {
                return false;
            }
        }
        if let Some(min_rooms) = self.min_rooms {
            if !listing.rooms.is_some_and(|rooms| rooms >= min_rooms) {
                return false;
            }
        }
        if let Some(min_size) = self.min_size_m2 {
            if !listing.size_m2.is_some_and(|size| size >= min_size) {
                return false;
            }
        }
        if let Some(max_distance) = self.max_distance_km {
            if !listing.distance_km.is_some_and(|d| d <= max_distance) {
                return false;
            }
        }
        true
    }

    /// Matching listings, cheapest first
    pub fn apply(&self, listings: Vec<StoredListing>) -> Vec<StoredListing> {
        let mut selected: Vec<StoredListing> =
            listings.into_iter().filter(|l| self.matches(l)).collect();
        selected.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.id.cmp(&b.id)));
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn stored(id: i64, price: Decimal, rooms: Option<u32>, size: Option<u32>, km: Option<f64>) -> StoredListing {
        StoredListing {
            id,
            platform: Platform::Pararius,
            external_id: format!("/{}", id),
            url: format!("https://www.pararius.nl/{}", id),
            title: "Appartement".into(),
            address: "3511 AB Utrecht".into(),
            price,
            size_m2: size,
            rooms,
            build_year: None,
            posted_at: None,
            description: None,
            latitude: None,
            longitude: None,
            nearest_poi: km.map(|_| "Utrecht Centraal".to_string()),
            distance_km: km,
            price_per_m2: None,
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
        }
    }

    fn default_filter() -> ListingFilter {
        ListingFilter::from(&FilterConfig::default())
    }

    #[test]
    fn default_filter_accepts_boundary_values() {
        let listing = stored(1, dec!(1450), Some(3), Some(60), Some(2.0));
        assert!(default_filter().matches(&listing));
    }

    #[test]
    fn default_filter_rejects_each_violation() {
        let filter = default_filter();
        assert!(!filter.matches(&stored(1, dec!(1450.01), Some(3), Some(60), Some(1.0))));
        assert!(!filter.matches(&stored(2, dec!(1200), Some(2), Some(60), Some(1.0))));
        assert!(!filter.matches(&stored(3, dec!(1200), Some(3), Some(59), Some(1.0))));
        assert!(!filter.matches(&stored(4, dec!(1200), Some(3), Some(60), Some(2.5))));
    }

    #[test]
    fn missing_constrained_field_does_not_match() {
        let filter = default_filter();
        assert!(!filter.matches(&stored(1, dec!(1200), None, Some(80), Some(1.0))));
        assert!(!filter.matches(&stored(2, dec!(1200), Some(4), None, Some(1.0))));
        assert!(!filter.matches(&stored(3, dec!(1200), Some(4), Some(80), None)));
    }

    #[test]
    fn unconstrained_filter_matches_everything() {
        assert!(ListingFilter::none().matches(&stored(1, dec!(99999), None, None, None)));
    }

    #[test]
    fn platform_filter() {
        let filter = ListingFilter {
            platform: Some(Platform::Jaap),
            ..ListingFilter::none()
        };
        assert!(!filter.matches(&stored(1, dec!(1000), None, None, None)));
    }

    #[test]
    fn apply_sorts_by_price() {
        let listings = vec![
            stored(1, dec!(1400), Some(3), Some(70), Some(1.0)),
            stored(2, dec!(1100), Some(3), Some(70), Some(1.0)),
            stored(3, dec!(2000), Some(3), Some(70), Some(1.0)),
            stored(4, dec!(1250), Some(4), Some(90), Some(0.5)),
        ];
        let ids: Vec<i64> = default_filter().apply(listings).iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }
}
