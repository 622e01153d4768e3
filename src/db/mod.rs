// Database module - SQLite connection, listings storage, scrape runs, geocode cache

pub mod models;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

use crate::geo::Coordinates;
pub use models::{EnrichedListing, Listing, Platform, ScrapeRun, StoredListing};

/// Get the default database path (~/.rentscout/listings.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let app_dir = PathBuf::from(home).join(".rentscout");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&app_dir).context("Failed to create .rentscout directory")?;

    Ok(app_dir.join("listings.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {:?}", parent))?;
    }
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;
    Ok(conn)
}

/// Initialize the database with schema and return an open connection.
///
/// The schema only uses `IF NOT EXISTS`, so this is safe on every start.
pub fn init_database(db_path: Option<PathBuf>) -> Result<Connection> {
    let conn = open_db(db_path)?;
    apply_schema(&conn)?;
    info!("Database ready");
    Ok(conn)
}

pub fn apply_schema(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;
    Ok(())
}

/// Whether an upsert created a new row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertStats {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Insert or overwrite a listing keyed by (platform, external_id).
///
/// `first_seen_at` survives re-scrapes; a missing description never wipes a
/// previously fetched one.
pub fn upsert_listing(conn: &Connection, enriched: &EnrichedListing) -> Result<UpsertOutcome> {
    let listing = &enriched.listing;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM listings WHERE platform = ?1 AND external_id = ?2",
            params![listing.platform.as_str(), listing.external_id],
            |row| row.get(0),
        )
        .optional()?;

    let raw_json =
        serde_json::to_string(&listing.raw).context("Failed to serialize raw listing fields")?;

    conn.execute(
        "INSERT INTO listings (
            platform, external_id, url, title, address, price,
            size_m2, rooms, build_year, posted_at, description, raw_json,
            latitude, longitude, nearest_poi, distance_km, price_per_m2,
            first_seen_at, last_seen_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
        ON CONFLICT(platform, external_id) DO UPDATE SET
            url = excluded.url,
            title = excluded.title,
            address = excluded.address,
            price = excluded.price,
            size_m2 = excluded.size_m2,
            rooms = excluded.rooms,
            build_year = excluded.build_year,
            posted_at = excluded.posted_at,
            description = COALESCE(excluded.description, listings.description),
            raw_json = excluded.raw_json,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            nearest_poi = excluded.nearest_poi,
            distance_km = excluded.distance_km,
            price_per_m2 = excluded.price_per_m2,
            last_seen_at = excluded.last_seen_at",
        params![
            listing.platform.as_str(),
            listing.external_id,
            listing.url,
            listing.title,
            listing.address,
            listing.price.to_string(),
            listing.size_m2,
            listing.rooms,
            listing.build_year,
            listing.posted_at,
            listing.description,
            raw_json,
            enriched.coordinates.map(|c| c.latitude),
            enriched.coordinates.map(|c| c.longitude),
            enriched.nearest_poi.as_ref().map(|p| p.name.as_str()),
            enriched.nearest_poi.as_ref().map(|p| p.distance_km),
            enriched.price_per_m2.map(|d| d.to_string()),
            enriched.scraped_at,
        ],
    )?;

    Ok(if existing.is_some() {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

/// Upsert a batch of listings in a single transaction
pub fn upsert_listings(conn: &Connection, listings: &[EnrichedListing]) -> Result<UpsertStats> {
    let tx = conn
        .unchecked_transaction()
        .context("Failed to start listings transaction")?;

    let mut stats = UpsertStats::default();
    for enriched in listings {
        match upsert_listing(&tx, enriched).with_context(|| {
            format!(
                "Failed to store {} listing {}",
                enriched.listing.platform, enriched.listing.external_id
            )
        })? {
            UpsertOutcome::Inserted => stats.inserted += 1,
            UpsertOutcome::Updated => stats.updated += 1,
        }
    }

    tx.commit().context("Failed to commit listings")?;
    debug!(
        "Stored {} listings ({} new, {} updated)",
        stats.total(),
        stats.inserted,
        stats.updated
    );
    Ok(stats)
}

const LISTING_COLUMNS: &str = "id, platform, external_id, url, title, address, price,
    size_m2, rooms, build_year, posted_at, description,
    latitude, longitude, nearest_poi, distance_km, price_per_m2,
    first_seen_at, last_seen_at";

fn row_to_stored_listing(row: &Row) -> Result<StoredListing, rusqlite::Error> {
    let platform: String = row.get(1)?;
    let platform = platform
        .parse::<Platform>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;

    Ok(StoredListing {
        id: row.get(0)?,
        platform,
        external_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        address: row.get(5)?,
        price: get_decimal_value(row, 6)?,
        size_m2: row.get(7)?,
        rooms: row.get(8)?,
        build_year: row.get(9)?,
        posted_at: row.get(10)?,
        description: row.get(11)?,
        latitude: row.get(12)?,
        longitude: row.get(13)?,
        nearest_poi: row.get(14)?,
        distance_km: row.get(15)?,
        price_per_m2: get_optional_decimal_value(row, 16)?,
        first_seen_at: row.get(17)?,
        last_seen_at: row.get(18)?,
    })
}

/// All stored listings, optionally for one platform, ordered by price
pub fn list_listings(conn: &Connection, platform: Option<Platform>) -> Result<Vec<StoredListing>> {
    let sql = format!(
        "SELECT {} FROM listings
         WHERE (?1 IS NULL OR platform = ?1)
         ORDER BY CAST(price AS REAL) ASC, id ASC",
        LISTING_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![platform.map(|p| p.as_str())],
        row_to_stored_listing,
    )?;

    let mut listings = Vec::new();
    for row in rows {
        listings.push(row?);
    }
    Ok(listings)
}

pub fn get_listing(
    conn: &Connection,
    platform: Platform,
    external_id: &str,
) -> Result<Option<StoredListing>> {
    let sql = format!(
        "SELECT {} FROM listings WHERE platform = ?1 AND external_id = ?2",
        LISTING_COLUMNS
    );
    let listing = conn
        .query_row(
            &sql,
            params![platform.as_str(), external_id],
            row_to_stored_listing,
        )
        .optional()?;
    Ok(listing)
}

pub fn count_listings(conn: &Connection, platform: Option<Platform>) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE (?1 IS NULL OR platform = ?1)",
        params![platform.map(|p| p.as_str())],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn set_description(conn: &Connection, listing_id: i64, description: &str) -> Result<()> {
    conn.execute(
        "UPDATE listings SET description = ?1 WHERE id = ?2",
        params![description, listing_id],
    )?;
    Ok(())
}

/// Record the start of a platform scrape, returns the run id
pub fn start_scrape_run(conn: &Connection, platform: Platform, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO scrape_runs (platform, started_at, success) VALUES (?1, ?2, 0)",
        params![platform.as_str(), now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Counters written when a platform scrape finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub pages_fetched: usize,
    pub listings_seen: usize,
    pub listings_stored: usize,
    pub listings_skipped: usize,
}

pub fn finish_scrape_run(
    conn: &Connection,
    run_id: i64,
    now: DateTime<Utc>,
    counters: &RunCounters,
    error: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE scrape_runs
         SET finished_at = ?1, pages_fetched = ?2, listings_seen = ?3,
             listings_stored = ?4, listings_skipped = ?5, success = ?6, error_message = ?7
         WHERE id = ?8",
        params![
            now,
            counters.pages_fetched as i64,
            counters.listings_seen as i64,
            counters.listings_stored as i64,
            counters.listings_skipped as i64,
            error.is_none(),
            error,
            run_id
        ],
    )?;
    Ok(())
}

pub fn recent_scrape_runs(conn: &Connection, limit: usize) -> Result<Vec<ScrapeRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, platform, started_at, finished_at, pages_fetched, listings_seen,
                listings_stored, listings_skipped, success, error_message
         FROM scrape_runs
         ORDER BY started_at DESC, id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit as i64], |row| {
        let platform: String = row.get(1)?;
        let platform = platform
            .parse::<Platform>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
        Ok(ScrapeRun {
            id: row.get(0)?,
            platform,
            started_at: row.get(2)?,
            finished_at: row.get(3)?,
            pages_fetched: row.get(4)?,
            listings_seen: row.get(5)?,
            listings_stored: row.get(6)?,
            listings_skipped: row.get(7)?,
            success: row.get(8)?,
            error_message: row.get(9)?,
        })
    })?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r?);
    }
    Ok(runs)
}

pub fn get_cached_geocode(conn: &Connection, query_key: &str) -> Result<Option<Coordinates>> {
    let coords = conn
        .query_row(
            "SELECT latitude, longitude FROM geocode_cache WHERE query_key = ?1",
            [query_key],
            |row| Ok(Coordinates::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(coords)
}

pub fn put_cached_geocode(conn: &Connection, query_key: &str, coords: Coordinates) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO geocode_cache (query_key, latitude, longitude) VALUES (?1, ?2, ?3)",
        params![query_key, coords.latitude, coords.longitude],
    )?;
    Ok(())
}

/// Helper to read Decimal from SQLite (handles both INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))?;
            Decimal::from_str(s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Real, Box::new(e))),
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            Type::Null,
        )),
    }
}

/// Helper to read optional Decimal from SQLite
fn get_optional_decimal_value(row: &Row, idx: usize) -> Result<Option<Decimal>, rusqlite::Error> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        _ => get_decimal_value(row, idx).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::PoiDistance;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    fn enriched(external_id: &str, price: Decimal) -> EnrichedListing {
        EnrichedListing {
            listing: Listing {
                platform: Platform::Pararius,
                external_id: external_id.to_string(),
                url: format!("https://www.pararius.nl{}", external_id),
                title: "Appartement Biltstraat".to_string(),
                address: "3572 AB Utrecht".to_string(),
                price,
                size_m2: Some(70),
                rooms: Some(3),
                build_year: Some(1932),
                posted_at: None,
                description: None,
                raw: BTreeMap::from([("specs".to_string(), "70 m² 3 kamers".to_string())]),
            },
            coordinates: Some(Coordinates::new(52.094, 5.131)),
            nearest_poi: Some(PoiDistance {
                name: "Utrecht Centraal".to_string(),
                distance_km: 1.5,
            }),
            price_per_m2: Some(dec!(20.71)),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_twice_keeps_one_row() {
        let conn = memory_db();
        let first = enriched("/appartement-te-huur/utrecht/abc/biltstraat", dec!(1450));
        assert_eq!(upsert_listing(&conn, &first).unwrap(), UpsertOutcome::Inserted);

        let mut second = first.clone();
        second.listing.price = dec!(1500);
        assert_eq!(upsert_listing(&conn, &second).unwrap(), UpsertOutcome::Updated);

        assert_eq!(count_listings(&conn, None).unwrap(), 1);
        let stored = get_listing(&conn, Platform::Pararius, &first.listing.external_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.price, dec!(1500));
        assert_eq!(stored.price_per_m2, Some(dec!(20.71)));
    }

    #[test]
    fn same_id_on_other_platform_is_a_different_row() {
        let conn = memory_db();
        let a = enriched("/huurhuizen/utrecht/1", dec!(1000));
        let mut b = a.clone();
        b.listing.platform = Platform::Jaap;
        upsert_listings(&conn, &[a, b]).unwrap();
        assert_eq!(count_listings(&conn, None).unwrap(), 2);
        assert_eq!(count_listings(&conn, Some(Platform::Jaap)).unwrap(), 1);
    }

    #[test]
    fn first_seen_is_preserved_and_description_not_wiped() {
        let conn = memory_db();
        let mut first = enriched("/x", dec!(900));
        first.scraped_at = Utc::now() - chrono::Duration::days(3);
        upsert_listing(&conn, &first).unwrap();
        let id = get_listing(&conn, Platform::Pararius, "/x").unwrap().unwrap().id;
        set_description(&conn, id, "Ruim appartement").unwrap();

        let second = enriched("/x", dec!(900));
        upsert_listing(&conn, &second).unwrap();

        let stored = get_listing(&conn, Platform::Pararius, "/x").unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("Ruim appartement"));
        assert!(stored.first_seen_at < stored.last_seen_at);
    }

    #[test]
    fn list_listings_sorted_by_price() {
        let conn = memory_db();
        upsert_listings(
            &conn,
            &[
                enriched("/c", dec!(1200)),
                enriched("/a", dec!(950)),
                enriched("/b", dec!(1100.50)),
            ],
        )
        .unwrap();
        let prices: Vec<Decimal> = list_listings(&conn, None)
            .unwrap()
            .into_iter()
            .map(|l| l.price)
            .collect();
        assert_eq!(prices, vec![dec!(950), dec!(1100.50), dec!(1200)]);
    }

    #[test]
    fn scrape_run_lifecycle() {
        let conn = memory_db();
        let run_id = start_scrape_run(&conn, Platform::Jaap, Utc::now()).unwrap();
        let counters = RunCounters {
            pages_fetched: 2,
            listings_seen: 30,
            listings_stored: 28,
            listings_skipped: 2,
        };
        finish_scrape_run(&conn, run_id, Utc::now(), &counters, Some("HTTP 503")).unwrap();

        let runs = recent_scrape_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].platform, Platform::Jaap);
        assert_eq!(runs[0].listings_stored, 28);
        assert!(!runs[0].success);
        assert_eq!(runs[0].error_message.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn geocode_cache_round_trip() {
        let conn = memory_db();
        assert_eq!(get_cached_geocode(&conn, "q:utrecht").unwrap(), None);
        put_cached_geocode(&conn, "q:utrecht", Coordinates::new(52.09, 5.12)).unwrap();
        assert_eq!(
            get_cached_geocode(&conn, "q:utrecht").unwrap(),
            Some(Coordinates::new(52.09, 5.12))
        );
    }

    #[test]
    fn init_database_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("listings.db");
        let conn = init_database(Some(path.clone())).unwrap();
        assert_eq!(count_listings(&conn, None).unwrap(), 0);
        assert!(path.exists());
    }
}
