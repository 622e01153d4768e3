//! Rentscout - rental listing scraper for Dutch housing sites
//!
//! Scrapes Pararius and Jaap, geocodes each listing's address, measures the
//! distance to the nearest point of interest and keeps the results in SQLite
//! for filtering and export.

pub mod cli;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod enrich;
pub mod error;
pub mod export;
pub mod filter;
pub mod geo;
pub mod pipeline;
pub mod scrapers;
