use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

use super::address::GeoQuery;
use super::Coordinates;
use crate::config::GeocoderConfig;
use crate::error::ScrapeError;

/// Resolves a query to coordinates. `Ok(None)` means the service answered
/// but found nothing.
pub trait Geocoder {
    fn geocode(&mut self, query: &GeoQuery) -> Result<Option<Coordinates>>;
}

/// Nominatim search result (only the fields we use)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Blocking OpenStreetMap Nominatim client.
///
/// Nominatim's usage policy allows at most one request per second and
/// requires an identifying user agent; both are enforced here.
pub struct NominatimClient {
    client: Client,
    base_url: String,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Nominatim HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_delay: Duration::from_millis(config.min_delay_ms),
            last_request: None,
        })
    }

    fn search_url(&self, query: &GeoQuery) -> Result<Url> {
        let endpoint = format!("{}/search", self.base_url);
        let mut params: Vec<(&str, &str)> = vec![("format", "jsonv2"), ("limit", "1")];
        match query {
            GeoQuery::PostalCode { code, country } => {
                params.push(("postalcode", code.as_str()));
                params.push(("country", country.as_str()));
            }
            GeoQuery::FreeText(text) => params.push(("q", text.as_str())),
        }
        Url::parse_with_params(&endpoint, &params)
            .with_context(|| format!("Invalid Nominatim URL: {}", endpoint))
    }

    fn wait_for_slot(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                std::thread::sleep(self.min_delay - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

impl Geocoder for NominatimClient {
    fn geocode(&mut self, query: &GeoQuery) -> Result<Option<Coordinates>> {
        let url = self.search_url(query)?;
        self.wait_for_slot();

        debug!("Nominatim lookup: {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(ScrapeError::from)
            .context("Failed to send request to Nominatim")?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .text()
            .context("Failed to read Nominatim response")?;
        parse_search_response(&body)
    }
}

fn parse_search_response(body: &str) -> Result<Option<Coordinates>> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).context("Failed to parse Nominatim response")?;

    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };

    let latitude: f64 = place
        .lat
        .parse()
        .map_err(|_| ScrapeError::Geocode(format!("invalid latitude '{}'", place.lat)))?;
    let longitude: f64 = place
        .lon
        .parse()
        .map_err(|_| ScrapeError::Geocode(format!("invalid longitude '{}'", place.lon)))?;

    let coords = Coordinates::new(latitude, longitude);
    if !coords.is_valid() {
        return Err(ScrapeError::Geocode(format!("out of range: {:?}", coords)).into());
    }

    if let Some(name) = place.display_name {
        info!("Geocoded to {}", name);
    }
    Ok(Some(coords))
}
