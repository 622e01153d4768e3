use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::geo::{Coordinates, PoiDistance};

/// Rental platforms supported by the scrapers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Pararius,
    Jaap,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Jaap, Platform::Pararius];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Pararius => "pararius",
            Platform::Jaap => "jaap",
        }
    }

    /// Host shown in the `website` export column
    pub fn website(&self) -> &'static str {
        match self {
            Platform::Pararius => "www.pararius.nl",
            Platform::Jaap => "www.jaap.nl",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pararius" | "pararius.nl" | "www.pararius.nl" => Ok(Platform::Pararius),
            "jaap" | "jaap.nl" | "www.jaap.nl" => Ok(Platform::Jaap),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// A listing after site-specific cleaning. Price and address are guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub platform: Platform,
    /// URL path without query or fragment; unique per platform
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub address: String,
    /// Monthly rent in EUR
    pub price: Decimal,
    pub size_m2: Option<u32>,
    pub rooms: Option<u32>,
    pub build_year: Option<i32>,
    pub posted_at: Option<NaiveDate>,
    pub description: Option<String>,
    pub raw: BTreeMap<String, String>,
}

/// Listing plus derived geographic and price metrics
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedListing {
    pub listing: Listing,
    pub coordinates: Option<Coordinates>,
    pub nearest_poi: Option<PoiDistance>,
    pub price_per_m2: Option<Decimal>,
    pub scraped_at: DateTime<Utc>,
}

/// Listing row as read back from the database
#[derive(Debug, Clone, Serialize)]
pub struct StoredListing {
    pub id: i64,
    pub platform: Platform,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub address: String,
    pub price: Decimal,
    pub size_m2: Option<u32>,
    pub rooms: Option<u32>,
    pub build_year: Option<i32>,
    pub posted_at: Option<NaiveDate>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub nearest_poi: Option<String>,
    pub distance_km: Option<f64>,
    pub price_per_m2: Option<Decimal>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Bookkeeping for one platform scrape within a run
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRun {
    pub id: i64,
    pub platform: Platform,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pages_fetched: i64,
    pub listings_seen: i64,
    pub listings_stored: i64,
    pub listings_skipped: i64,
    pub success: bool,
    pub error_message: Option<String>,
}
