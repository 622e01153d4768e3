//! Output formatting module for CLI display
//!
//! Tables for humans, JSON for scripts. Nothing in here touches the database.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::db::{ScrapeRun, StoredListing};
use crate::pipeline::RunSummary;

/// Pretty JSON, or an error object if serialization fails
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn format_eur(amount: Decimal) -> String {
    format!("€ {:.0}", amount)
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn format_listings_table(listings: &[StoredListing]) -> String {
    #[derive(Tabled)]
    struct ListingRow {
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "m²")]
        size: String,
        #[tabled(rename = "€/m²")]
        price_per_m2: String,
        #[tabled(rename = "Rooms")]
        rooms: String,
        #[tabled(rename = "Distance")]
        distance: String,
        #[tabled(rename = "Address")]
        address: String,
        #[tabled(rename = "Site")]
        site: String,
        #[tabled(rename = "URL")]
        url: String,
    }

    let rows: Vec<ListingRow> = listings
        .iter()
        .map(|l| ListingRow {
            price: format_eur(l.price),
            size: or_dash(l.size_m2),
            price_per_m2: l
                .price_per_m2
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "-".to_string()),
            rooms: or_dash(l.rooms),
            distance: match l.distance_km {
                Some(km) if km <= 1.0 => format!("{:.2} km", km).green().to_string(),
                Some(km) => format!("{:.2} km", km),
                None => "?".yellow().to_string(),
            },
            address: truncate(&l.address, 40),
            site: l.platform.to_string(),
            url: l.url.clone(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(0..5), Alignment::right());

    format!(
        "\n{} {} listing(s)\n\n{}\n",
        "🏠".cyan().bold(),
        listings.len(),
        table
    )
}

pub fn format_empty_listings() -> String {
    format!(
        "{} No listings found\nScrape first using: {} --scrape-all (or relax the filter with --all)\n",
        "ℹ".blue().bold(),
        "rentscout".bold()
    )
}

pub fn format_runs_table(runs: &[ScrapeRun]) -> String {
    if runs.is_empty() {
        return format!("{} No scrape runs recorded yet\n", "ℹ".blue().bold());
    }

    #[derive(Tabled)]
    struct RunRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Platform")]
        platform: String,
        #[tabled(rename = "Started")]
        started: String,
        #[tabled(rename = "Pages")]
        pages: i64,
        #[tabled(rename = "Seen")]
        seen: i64,
        #[tabled(rename = "Stored")]
        stored: i64,
        #[tabled(rename = "Skipped")]
        skipped: i64,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<RunRow> = runs
        .iter()
        .map(|r| RunRow {
            id: r.id,
            platform: r.platform.to_string(),
            started: r.started_at.format("%Y-%m-%d %H:%M").to_string(),
            pages: r.pages_fetched,
            seen: r.listings_seen,
            stored: r.listings_stored,
            skipped: r.listings_skipped,
            status: match (&r.finished_at, r.success, &r.error_message) {
                (None, _, _) => "running".yellow().to_string(),
                (Some(_), true, _) => "ok".green().to_string(),
                (Some(_), false, Some(msg)) => truncate(msg, 50).red().to_string(),
                (Some(_), false, None) => "failed".red().to_string(),
            },
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..7), Alignment::right());
    format!("{}\n", table)
}

pub fn format_run_summaries(summaries: &[RunSummary]) -> String {
    let mut output = String::new();
    for s in summaries {
        let marker = if s.succeeded() {
            "✓".green().bold()
        } else {
            "⚠".yellow().bold()
        };
        output.push_str(&format!(
            "{} {:<9} {} page(s), {} seen, {} stored ({} new), {} skipped",
            marker,
            s.platform.to_string().bold(),
            s.pages_fetched,
            s.listings_seen,
            s.listings_stored,
            s.listings_new,
            s.listings_skipped
        ));
        if s.geocode_failures > 0 {
            output.push_str(&format!(", {} not geocoded", s.geocode_failures));
        }
        if s.descriptions_fetched > 0 {
            output.push_str(&format!(", {} descriptions", s.descriptions_fetched));
        }
        output.push('\n');
        if let Some(err) = &s.error {
            output.push_str(&format!("  {} {}\n", "stopped early:".red(), err));
        }
    }
    output
}
