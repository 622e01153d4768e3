use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::config::FilterConfig;
use crate::db::Platform;
use crate::filter::ListingFilter;

pub mod formatters;

#[derive(Parser, Debug)]
#[command(name = "rentscout")]
#[command(
    version,
    about = "Scrape Dutch rental listings and rank them by distance to the station"
)]
#[command(
    long_about = "Scrape rental listings from Pararius and Jaap, geocode their addresses, compute the distance to the nearest point of interest (Utrecht Centraal by default) and keep everything in a local SQLite database for filtering and export.\n\nWithout a subcommand every selected platform is scraped."
)]
pub struct Cli {
    /// Scrape every supported platform (the default when no platform flag is given)
    #[arg(long = "scrape-all", alias = "scrape_all")]
    pub scrape_all: bool,

    /// Scrape jaap.nl
    #[arg(long = "scrape-jaap", alias = "scrape_jaap")]
    pub scrape_jaap: bool,

    /// Scrape pararius.nl
    #[arg(long = "scrape-pararius", alias = "scrape_pararius")]
    pub scrape_pararius: bool,

    /// Only scrape the first result page of each platform
    #[arg(long, global = true)]
    pub debug: bool,

    /// SQLite database file (default: ~/.rentscout/listings.db)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Configuration file (default: $XDG_CONFIG_HOME/rentscout/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrape platforms, enrich listings and store them
    Scrape {
        /// Platform to scrape (pararius, jaap); repeatable, default all
        #[arg(short, long = "platform", value_name = "PLATFORM")]
        platforms: Vec<Platform>,
    },

    /// Show stored listings that match the filter, cheapest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Ignore the configured filter and show everything
        #[arg(long)]
        all: bool,

        /// Show at most this many listings
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Export matching listings to CSV or XLSX
    Export {
        /// Output file; a .xlsx extension selects the workbook format
        path: PathBuf,

        /// Write an XLSX workbook regardless of the extension
        #[arg(long)]
        xlsx: bool,

        #[command(flatten)]
        filter: FilterArgs,

        /// Ignore the configured filter and export everything
        #[arg(long)]
        all: bool,
    },

    /// Show recent scrape runs
    Runs {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

impl Cli {
    /// Platforms to scrape: the top-level flags combined with any
    /// `scrape --platform` values; everything when neither selects one.
    pub fn scrape_platforms(&self) -> Vec<Platform> {
        let explicit: &[Platform] = match &self.command {
            Some(Commands::Scrape { platforms }) => platforms,
            _ => &[],
        };
        if explicit.is_empty() {
            return crate::pipeline::select_platforms(
                self.scrape_all,
                self.scrape_jaap,
                self.scrape_pararius,
            );
        }
        if self.scrape_all {
            return Platform::ALL.to_vec();
        }
        Platform::ALL
            .into_iter()
            .filter(|p| {
                explicit.contains(p)
                    || (*p == Platform::Jaap && self.scrape_jaap)
                    || (*p == Platform::Pararius && self.scrape_pararius)
            })
            .collect()
    }
}

/// Overrides for the configured listing filter
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Maximum monthly rent in EUR
    #[arg(long, value_name = "EUR")]
    pub max_price: Option<Decimal>,

    /// Minimum number of rooms
    #[arg(long)]
    pub min_rooms: Option<u32>,

    /// Minimum floor area in m²
    #[arg(long = "min-size", value_name = "M2")]
    pub min_size_m2: Option<u32>,

    /// Maximum distance to the nearest point of interest in km
    #[arg(long = "max-distance", value_name = "KM")]
    pub max_distance_km: Option<f64>,

    /// Only listings from this platform
    #[arg(long)]
    pub platform: Option<Platform>,
}

impl FilterArgs {
    /// Start from the configured filter (or nothing with `all`) and apply
    /// the flags given on the command line.
    pub fn to_filter(&self, defaults: &FilterConfig, all: bool) -> ListingFilter {
        let mut filter = if all {
            ListingFilter::none()
        } else {
            ListingFilter::from(defaults)
        };
        if self.max_price.is_some() {
            filter.max_price = self.max_price;
        }
        if self.min_rooms.is_some() {
            filter.min_rooms = self.min_rooms;
        }
        if self.min_size_m2.is_some() {
            filter.min_size_m2 = self.min_size_m2;
        }
        if self.max_distance_km.is_some() {
            filter.max_distance_km = self.max_distance_km;
        }
        filter.platform = self.platform;
        filter
    }
}
