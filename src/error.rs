//! Error handling for rentscout
//!
//! Defines the scraping/enrichment error types and establishes a unified
//! Result type using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for the scrape → enrich → persist pipeline
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("listing is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("geocode error: {0}")]
    Geocode(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Db(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Http(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = anyhow::Result<T>;
