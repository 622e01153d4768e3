//! Geographic helpers: coordinates, distances and geocoding
//!
//! Distances use the haversine formula on a spherical Earth, which is well
//! within the precision needed to rank rentals by distance to a station.

pub mod address;
pub mod cache;
pub mod nominatim;

use serde::{Deserialize, Serialize};

pub use address::{extract_zipcode, remove_keywords, GeoQuery};
pub use cache::CachedGeocoder;
pub use nominatim::{Geocoder, NominatimClient};

/// Mean Earth radius (IUGG) in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Latitude/longitude in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Fixed reference location such as a train station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Distance from a listing to a point of interest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoiDistance {
    pub name: String,
    pub distance_km: f64,
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // clamp guards against h drifting just above 1.0 for antipodal points
    let central_angle = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * central_angle
}

/// Closest point of interest, or None when no POIs are configured.
pub fn nearest_poi(from: Coordinates, pois: &[PointOfInterest]) -> Option<PoiDistance> {
    pois.iter()
        .map(|poi| PoiDistance {
            name: poi.name.clone(),
            distance_km: haversine_km(from, poi.coordinates),
        })
        .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utrecht_centraal() -> Coordinates {
        Coordinates::new(52.0894, 5.1101)
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(utrecht_centraal(), utrecht_centraal()), 0.0);
    }

    #[test]
    fn distance_is_symmetric_and_non_negative() {
        let groningen = Coordinates::new(53.2105, 6.5641);
        let ab = haversine_km(utrecht_centraal(), groningen);
        let ba = haversine_km(groningen, utrecht_centraal());
        assert!(ab >= 0.0);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn utrecht_to_groningen_station_is_about_160_km() {
        // Straight-line distance Utrecht Centraal → Groningen station
        let groningen = Coordinates::new(53.2105, 6.5641);
        let km = haversine_km(utrecht_centraal(), groningen);
        assert!((150.0..170.0).contains(&km), "got {}", km);
    }

    #[test]
    fn distance_grows_with_separation() {
        let origin = utrecht_centraal();
        let mut previous = 0.0;
        for step in 1..=20 {
            let p = Coordinates::new(origin.latitude + step as f64 * 0.01, origin.longitude);
            let d = haversine_km(origin, p);
            assert!(d > previous, "distance must increase at step {}", step);
            previous = d;
        }
    }

    #[test]
    fn one_degree_latitude_is_about_111_km() {
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn nearest_poi_picks_the_closest() {
        let pois = vec![
            PointOfInterest {
                name: "Utrecht Centraal".into(),
                coordinates: utrecht_centraal(),
            },
            PointOfInterest {
                name: "Utrecht Overvecht".into(),
                coordinates: Coordinates::new(52.1108, 5.1002),
            },
        ];
        let near_overvecht = Coordinates::new(52.1100, 5.1010);
        let nearest = nearest_poi(near_overvecht, &pois).unwrap();
        assert_eq!(nearest.name, "Utrecht Overvecht");
        assert!(nearest.distance_km < 0.2);
    }

    #[test]
    fn nearest_poi_with_no_pois_is_none() {
        assert!(nearest_poi(utrecht_centraal(), &[]).is_none());
    }

    #[test]
    fn coordinates_validation() {
        assert!(utrecht_centraal().is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}
