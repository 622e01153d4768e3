//! Text cleaning shared by the site scrapers

use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};
use std::str::FromStr;
use url::Url;

use crate::error::ScrapeError;

static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9][0-9.]*(?:,[0-9]{1,2})?").expect("valid price regex"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::Parse(format!("invalid selector '{}': {}", css, e)).into())
}

/// Non-empty value of a required raw field
pub fn require<'a>(value: Option<&'a String>, field: &'static str) -> Result<&'a str, ScrapeError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(ScrapeError::MissingField(field))
}

/// First capture of the first regex in `patterns` that matches
pub fn first_number<T: FromStr>(patterns: &[&Regex], text: &str) -> Option<T> {
    patterns.iter().find_map(|re| capture_number(re, text))
}

/// Collapse all whitespace (including newlines) to single spaces
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Text content of the first element matching `sel`, whitespace-normalized
pub(crate) fn first_text(el: &ElementRef, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(|node| normalize_whitespace(&node.text().collect::<Vec<_>>().join(" ")))
        .filter(|text| !text.is_empty())
}

pub(crate) fn first_attr(el: &ElementRef, sel: &Selector, attr: &str) -> Option<String> {
    el.select(sel)
        .next()
        .and_then(|node| node.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse a Dutch rent string such as `€ 1.450 per maand` or `€ 1.250 k.k.`.
///
/// Dots are thousands separators and a comma starts the cents. Returns `None`
/// when there is no number at all ("Prijs op aanvraag").
pub fn parse_price(text: &str) -> Option<Decimal> {
    let matched = PRICE_RE.find(text)?.as_str();
    let normalized = matched.replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).ok()
}

/// First capture group of `re` in `text` as a number
pub fn capture_number<T: FromStr>(re: &Regex, text: &str) -> Option<T> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Drop query string and fragment
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Stable listing key: the URL path without query or fragment.
pub fn external_id_from_url(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => strip_query(url).to_string(),
    };
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Pararius prefixes some addresses with a "Nieuw" badge
pub fn strip_new_badge(address: &str) -> String {
    let trimmed = address.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) if first.eq_ignore_ascii_case("nieuw") => rest.trim().to_string(),
        _ => trimmed.to_string(),
    }
}

/// Posting dates appear either as ISO dates or Dutch day-month-year
pub fn parse_posting_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d-%m-%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_pararius_price() {
        assert_eq!(parse_price("€ 1.450 per maand"), Some(dec!(1450)));
        assert_eq!(parse_price("€1.995 per maand"), Some(dec!(1995)));
    }

    #[test]
    fn parses_jaap_price() {
        assert_eq!(parse_price("€ 1.250 k.k."), Some(dec!(1250)));
        assert_eq!(parse_price("€ 985,50 p.m."), Some(dec!(985.50)));
    }

    #[test]
    fn price_on_request_is_none() {
        assert_eq!(parse_price("Prijs op aanvraag"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(normalize_whitespace("  70 m²\n\n 3 kamers  "), "70 m² 3 kamers");
    }

    #[test]
    fn capture_number_from_specs() {
        let re = Regex::new(r"([0-9]+) kamers").unwrap();
        assert_eq!(capture_number::<u32>(&re, "85 m² 4 kamers"), Some(4));
        assert_eq!(capture_number::<u32>(&re, "85 m²"), None);
    }

    #[test]
    fn external_id_ignores_query_and_trailing_slash() {
        assert_eq!(
            external_id_from_url("https://www.jaap.nl/huurhuizen/utrecht/abc-12/?ref=list#top"),
            Some("/huurhuizen/utrecht/abc-12".to_string())
        );
        assert_eq!(
            external_id_from_url("/appartement-te-huur/utrecht/1a2b/lange-nieuwstraat?x=1"),
            Some("/appartement-te-huur/utrecht/1a2b/lange-nieuwstraat".to_string())
        );
        assert_eq!(external_id_from_url("https://www.jaap.nl/"), None);
    }

    #[test]
    fn strip_query_keeps_path() {
        assert_eq!(strip_query("https://x.nl/a?b=c"), "https://x.nl/a");
        assert_eq!(strip_query("https://x.nl/a"), "https://x.nl/a");
    }

    #[test]
    fn new_badge_is_removed() {
        assert_eq!(strip_new_badge("Nieuw 3511 AB Utrecht (Binnenstad)"), "3511 AB Utrecht (Binnenstad)");
        assert_eq!(strip_new_badge("3511 AB Utrecht"), "3511 AB Utrecht");
        assert_eq!(strip_new_badge("Nieuwegracht 12"), "Nieuwegracht 12");
    }

    #[test]
    fn posting_dates() {
        assert_eq!(
            parse_posting_date("2024-03-01T10:00:00Z"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_posting_date("01-03-2024"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(parse_posting_date("gisteren"), None);
    }
}
