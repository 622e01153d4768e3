//! CSV and XLSX export of stored listings

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::db::StoredListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// `.xlsx` paths export a workbook, everything else CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ExportFormat::Xlsx,
            _ => ExportFormat::Csv,
        }
    }
}

/// One exported row; field order is the column order
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    title: &'a str,
    description: &'a str,
    address: &'a str,
    price: String,
    size_m2: Option<u32>,
    price_per_m2: Option<String>,
    rooms: Option<u32>,
    dist_to_poi_km: Option<f64>,
    build_year: Option<i32>,
    scrape_date: String,
    website: &'static str,
    url: &'a str,
}

const HEADERS: [&str; 12] = [
    "title",
    "description",
    "address",
    "price",
    "size_m2",
    "price_per_m2",
    "rooms",
    "dist_to_poi_km",
    "build_year",
    "scrape_date",
    "website",
    "url",
];

impl<'a> From<&'a StoredListing> for ExportRow<'a> {
    fn from(listing: &'a StoredListing) -> Self {
        Self {
            title: &listing.title,
            description: listing.description.as_deref().unwrap_or_default(),
            address: &listing.address,
            price: listing.price.to_string(),
            size_m2: listing.size_m2,
            price_per_m2: listing.price_per_m2.map(|p| p.to_string()),
            rooms: listing.rooms,
            dist_to_poi_km: listing.distance_km.map(|d| (d * 1000.0).round() / 1000.0),
            build_year: listing.build_year,
            scrape_date: listing.last_seen_at.format("%Y-%m-%d").to_string(),
            website: listing.platform.website(),
            url: &listing.url,
        }
    }
}

pub fn export(listings: &[StoredListing], path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => export_csv(listings, path),
        ExportFormat::Xlsx => export_xlsx(listings, path),
    }
}

pub fn export_csv(listings: &[StoredListing], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {:?}", path))?;
    if listings.is_empty() {
        writer.write_record(HEADERS)?;
    }
    for listing in listings {
        writer
            .serialize(ExportRow::from(listing))
            .with_context(|| format!("Failed to write listing {}", listing.url))?;
    }
    writer.flush().context("Failed to flush CSV file")?;
    info!("Exported {} listings to {:?}", listings.len(), path);
    Ok(())
}

pub fn export_xlsx(listings: &[StoredListing], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("listings")
        .context("Failed to name worksheet")?;

    let header_format = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .with_context(|| format!("Failed to write header '{}'", header))?;
    }

    for (i, listing) in listings.iter().enumerate() {
        let row = (i + 1) as u32;
        let r = ExportRow::from(listing);

        worksheet.write_string(row, 0, r.title)?;
        worksheet.write_string(row, 1, r.description)?;
        worksheet.write_string(row, 2, r.address)?;
        worksheet.write_number(row, 3, listing.price.to_f64().unwrap_or_default())?;
        if let Some(size) = r.size_m2 {
            worksheet.write_number(row, 4, f64::from(size))?;
        }
        if let Some(ppm) = listing.price_per_m2.and_then(|p| p.to_f64()) {
            worksheet.write_number(row, 5, ppm)?;
        }
        if let Some(rooms) = r.rooms {
            worksheet.write_number(row, 6, f64::from(rooms))?;
        }
        if let Some(km) = r.dist_to_poi_km {
            worksheet.write_number(row, 7, km)?;
        }
        if let Some(year) = r.build_year {
            worksheet.write_number(row, 8, f64::from(year))?;
        }
        worksheet.write_string(row, 9, &r.scrape_date)?;
        worksheet.write_string(row, 10, r.website)?;
        worksheet.write_url(row, 11, r.url)?;
    }

    worksheet.autofit();
    workbook
        .save(path)
        .with_context(|| format!("Failed to save workbook {:?}", path))?;
    info!("Exported {} listings to {:?}", listings.len(), path);
    Ok(())
}
