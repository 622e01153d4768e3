//! Configuration loading
//!
//! Everything has a built-in default so the tool runs without a config file.
//! A TOML file (explicit `--config`, or `$XDG_CONFIG_HOME/rentscout/config.toml`)
//! overrides the defaults, and a few environment variables override the file.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::db::Platform;
use crate::error::ScrapeError;
use crate::geo::{Coordinates, PointOfInterest};

const CONFIG_FILENAME: &str = "config.toml";
pub const ENV_DB_PATH: &str = "RENTSCOUT_DB";
pub const ENV_NOMINATIM_URL: &str = "RENTSCOUT_NOMINATIM_URL";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file; defaults to ~/.rentscout/listings.db
    pub database: Option<PathBuf>,
    pub scrape: ScrapeConfig,
    pub platforms: PlatformsConfig,
    pub geocoder: GeocoderConfig,
    pub filter: FilterConfig,
    #[serde(rename = "poi")]
    pub pois: Vec<PoiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Pause between consecutive search-result pages
    pub request_delay_ms: u64,
    /// Base pause between detail-page requests; a random jitter of up to the
    /// same amount is added
    pub detail_delay_ms: u64,
    pub max_pages: usize,
    /// Fetch detail-page descriptions for listings that pass the filter
    pub fetch_descriptions: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 2000,
            request_delay_ms: 2000,
            detail_delay_ms: 1000,
            max_pages: 50,
            fetch_descriptions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub pararius_url: String,
    pub jaap_url: String,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            pararius_url: "https://www.pararius.nl/huurwoningen/utrecht/".to_string(),
            jaap_url: "https://www.jaap.nl/huurhuizen/utrecht/".to_string(),
        }
    }
}

impl PlatformsConfig {
    pub fn start_url(&self, platform: Platform) -> &str {
        match platform {
            Platform::Pararius => &self.pararius_url,
            Platform::Jaap => &self.jaap_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    /// Nominatim requires an identifying user agent
    pub user_agent: String,
    pub country: String,
    pub min_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("rentscout/{}", env!("CARGO_PKG_VERSION")),
            country: crate::geo::address::DEFAULT_COUNTRY.to_string(),
            min_delay_ms: 1000,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub max_price: Option<u32>,
    pub min_rooms: Option<u32>,
    pub min_size_m2: Option<u32>,
    pub max_distance_km: Option<f64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_price: Some(1450),
            min_rooms: Some(3),
            min_size_m2: Some(60),
            max_distance_km: Some(2.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Config {
    /// Load configuration from an explicit path, the default location, or
    /// built-in defaults, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Config::default()
                }
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading config from {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow!(ScrapeError::Config(e.to_string())))
    }

    fn apply_env_overrides(&mut self) {
        if let Some(db) = std::env::var_os(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Ok(url) = std::env::var(ENV_NOMINATIM_URL) {
            if !url.trim().is_empty() {
                self.geocoder.base_url = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scrape.max_pages == 0 {
            return Err(ScrapeError::Config("scrape.max_pages must be at least 1".into()).into());
        }
        for platform in Platform::ALL {
            let url = self.platforms.start_url(platform);
            Url::parse(url).map_err(|e| {
                ScrapeError::Config(format!("invalid {} start URL '{}': {}", platform, url, e))
            })?;
        }
        Url::parse(&self.geocoder.base_url).map_err(|e| {
            ScrapeError::Config(format!(
                "invalid geocoder URL '{}': {}",
                self.geocoder.base_url, e
            ))
        })?;
        for poi in &self.pois {
            if !Coordinates::new(poi.latitude, poi.longitude).is_valid() {
                return Err(ScrapeError::Config(format!(
                    "point of interest '{}' has invalid coordinates",
                    poi.name
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Configured points of interest, or Utrecht Centraal when none are set.
    pub fn points_of_interest(&self) -> Vec<PointOfInterest> {
        if self.pois.is_empty() {
            return vec![PointOfInterest {
                name: "Utrecht Centraal".to_string(),
                coordinates: Coordinates::new(52.0894, 5.1101),
            }];
        }
        self.pois
            .iter()
            .map(|poi| PointOfInterest {
                name: poi.name.clone(),
                coordinates: Coordinates::new(poi.latitude, poi.longitude),
            })
            .collect()
    }
}

/// `$XDG_CONFIG_HOME/rentscout/config.toml` (or the platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::config_home)
        .map(|dir| dir.join("rentscout").join(CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_values() {
        let config = Config::default();
        assert_eq!(config.filter.max_price, Some(1450));
        assert_eq!(config.filter.min_rooms, Some(3));
        assert_eq!(config.filter.min_size_m2, Some(60));
        assert_eq!(config.filter.max_distance_km, Some(2.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_poi_is_utrecht_centraal() {
        let pois = Config::default().points_of_interest();
        assert_eq!(pois.len(), 1);
        assert_eq!(pois[0].name, "Utrecht Centraal");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            database = "/tmp/listings.db"

            [scrape]
            max_pages = 3

            [filter]
            max_price = 1800

            [[poi]]
            name = "Utrecht Vaartsche Rijn"
            latitude = 52.0788
            longitude = 5.1249
            "#,
        )
        .unwrap();

        assert_eq!(config.database, Some(PathBuf::from("/tmp/listings.db")));
        assert_eq!(config.scrape.max_pages, 3);
        assert_eq!(config.scrape.max_retries, 3);
        assert_eq!(config.filter.max_price, Some(1800));
        assert_eq!(config.filter.min_rooms, Some(3));
        assert_eq!(config.points_of_interest()[0].name, "Utrecht Vaartsche Rijn");
        assert!(config.platforms.jaap_url.contains("jaap.nl"));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = Config::from_toml("[scrape\nmax_pages = ").unwrap_err();
        assert!(err.to_string().starts_with("config error"));
    }

    #[test]
    fn zero_max_pages_is_rejected() {
        let mut config = Config::default();
        config.scrape.max_pages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_poi_is_rejected() {
        let mut config = Config::default();
        config.pois.push(PoiConfig {
            name: "Nowhere".into(),
            latitude: 123.0,
            longitude: 5.0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn start_url_per_platform() {
        let platforms = PlatformsConfig::default();
        assert!(platforms.start_url(Platform::Pararius).contains("pararius.nl"));
        assert!(platforms.start_url(Platform::Jaap).contains("jaap.nl"));
    }
}
