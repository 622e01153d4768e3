use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

use super::address::GeoQuery;
use super::nominatim::Geocoder;
use super::Coordinates;
use crate::db;

/// Geocoder wrapper backed by the `geocode_cache` table.
///
/// Re-scrapes mostly see the same addresses, so after the first run almost
/// no Nominatim requests are needed. Only successful lookups are stored;
/// a miss is retried on the next run.
pub struct CachedGeocoder<'c, G> {
    conn: &'c Connection,
    inner: G,
    hits: usize,
    lookups: usize,
}

impl<'c, G: Geocoder> CachedGeocoder<'c, G> {
    pub fn new(conn: &'c Connection, inner: G) -> Self {
        Self {
            conn,
            inner,
            hits: 0,
            lookups: 0,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn lookups(&self) -> usize {
        self.lookups
    }

    pub fn into_inner(self) -> G {
        self.inner
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<'_, G> {
    fn geocode(&mut self, query: &GeoQuery) -> Result<Option<Coordinates>> {
        let key = query.cache_key();
        if let Some(coords) = db::get_cached_geocode(self.conn, &key)? {
            debug!("Geocode cache hit for {}", key);
            self.hits += 1;
            return Ok(Some(coords));
        }

        self.lookups += 1;
        let found = self.inner.geocode(query)?;
        if let Some(coords) = found {
            if let Err(e) = db::put_cached_geocode(self.conn, &key, coords) {
                warn!("Failed to cache geocode for {}: {}", key, e);
            }
        }
        Ok(found)
    }
}
