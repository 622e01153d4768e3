//! Command dispatcher that routes parsed CLI arguments to their handlers.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::Path;
use tracing::info;

use crate::cli::formatters;
use crate::cli::{Cli, Commands, FilterArgs};
use crate::config::Config;
use crate::db::{self, Platform};
use crate::export::{self, ExportFormat};
use crate::geo::{CachedGeocoder, NominatimClient};
use crate::pipeline::Pipeline;
use crate::scrapers::HttpFetcher;

/// Route a parsed command line to its handler
pub fn dispatch(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db_path) = &cli.db {
        config.database = Some(db_path.clone());
    }

    match &cli.command {
        None | Some(Commands::Scrape { .. }) => {
            dispatch_scrape(&config, &cli.scrape_platforms(), cli.debug, cli.json)
        }
        Some(Commands::List { filter, all, limit }) => {
            dispatch_list(&config, filter, *all, *limit, cli.json)
        }
        Some(Commands::Export {
            path,
            xlsx,
            filter,
            all,
        }) => dispatch_export(&config, path, *xlsx, filter, *all, cli.json),
        Some(Commands::Runs { limit }) => dispatch_runs(&config, *limit, cli.json),
    }
}

fn dispatch_scrape(config: &Config, platforms: &[Platform], debug: bool, json_output: bool) -> Result<()> {
    let names: Vec<&str> = platforms.iter().map(|p| p.as_str()).collect();
    info!("Scraping {}", names.join(", "));

    let conn = db::init_database(config.database.clone())?;
    let fetcher = HttpFetcher::new(&config.scrape)?;
    let geocoder = CachedGeocoder::new(&conn, NominatimClient::new(&config.geocoder)?);

    let mut pipeline = Pipeline::new(&conn, config, fetcher, geocoder)
        .debug(debug)
        .show_progress(!json_output && std::io::stderr().is_terminal());
    let summaries = pipeline.run(platforms)?;

    if json_output {
        println!("{}", formatters::to_json(&summaries));
    } else {
        print!("\n{}", formatters::format_run_summaries(&summaries));
        let total = db::count_listings(&conn, None)?;
        println!("\n{} {} listings in database\n", "✓".green().bold(), total);
    }
    Ok(())
}

fn dispatch_list(
    config: &Config,
    filter_args: &FilterArgs,
    all: bool,
    limit: Option<usize>,
    json_output: bool,
) -> Result<()> {
    let conn = db::init_database(config.database.clone())?;
    let filter = filter_args.to_filter(&config.filter, all);
    let mut listings = filter.apply(db::list_listings(&conn, filter.platform)?);
    if let Some(limit) = limit {
        listings.truncate(limit);
    }

    if json_output {
        println!("{}", formatters::to_json(&listings));
    } else if listings.is_empty() {
        print!("{}", formatters::format_empty_listings());
    } else {
        print!("{}", formatters::format_listings_table(&listings));
    }
    Ok(())
}

fn dispatch_export(
    config: &Config,
    path: &Path,
    xlsx: bool,
    filter_args: &FilterArgs,
    all: bool,
    json_output: bool,
) -> Result<()> {
    let conn = db::init_database(config.database.clone())?;
    let filter = filter_args.to_filter(&config.filter, all);
    let listings = filter.apply(db::list_listings(&conn, filter.platform)?);

    let format = if xlsx {
        ExportFormat::Xlsx
    } else {
        ExportFormat::from_path(path)
    };
    export::export(&listings, path, format)
        .with_context(|| format!("Failed to export listings to {:?}", path))?;

    if json_output {
        #[derive(serde::Serialize)]
        struct ExportJson<'a> {
            path: &'a Path,
            exported: usize,
        }
        println!(
            "{}",
            formatters::to_json(&ExportJson {
                path,
                exported: listings.len(),
            })
        );
    } else {
        println!(
            "\n{} Exported {} listings to: {}\n",
            "✓".green().bold(),
            listings.len(),
            path.display()
        );
    }
    Ok(())
}

fn dispatch_runs(config: &Config, limit: usize, json_output: bool) -> Result<()> {
    let conn = db::init_database(config.database.clone())?;
    let runs = db::recent_scrape_runs(&conn, limit)?;
    if json_output {
        println!("{}", formatters::to_json(&runs));
    } else {
        print!("{}", formatters::format_runs_table(&runs));
    }
    Ok(())
}
