//! Address clean-up for geocoding Dutch listing addresses

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Listing-type words that sites prepend to addresses ("Appartement Laan van …")
const KEYWORDS: &[&str] = &["appartement", "huis", "kamer"];

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("keyword regex is valid")
});

static MULTI_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\s+").expect("whitespace regex is valid"));

// Dutch postal codes: four digits, optional spaces, two capitals
static ZIPCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4}\s*?[A-Z]{2}").expect("zipcode regex is valid"));

/// Country sent along with postal-code lookups
pub const DEFAULT_COUNTRY: &str = "Netherlands";

/// Remove listing-type keywords and collapse whitespace.
///
/// ```
/// use rentscout::geo::remove_keywords;
///
/// assert_eq!(
///     remove_keywords("Appartement Laan van Nieuw-Guinea  Utrecht"),
///     "Laan van Nieuw-Guinea Utrecht"
/// );
/// ```
pub fn remove_keywords(s: &str) -> String {
    let without = KEYWORD_RE.replace_all(s, "");
    let collapsed = MULTI_SPACE_RE.replace_all(&without, " ");
    collapsed.trim().to_string()
}

/// Extract a Dutch postal code (`1234AB`) from free text.
///
/// Spaces between digits and letters are removed. When several postal codes
/// are present the first one wins.
///
/// ```
/// use rentscout::geo::extract_zipcode;
///
/// assert_eq!(extract_zipcode("3531  JB Utrecht"), Some("3531JB".to_string()));
/// assert_eq!(extract_zipcode("123AB"), None);
/// ```
pub fn extract_zipcode(s: &str) -> Option<String> {
    let mut matches = ZIPCODE_RE.find_iter(s);
    let first = matches.next()?;
    if matches.next().is_some() {
        warn!("Multiple zipcodes found in '{}', taking the first occurrence", s);
    }
    Some(first.as_str().split_whitespace().collect())
}

/// What to ask the geocoder for a given address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoQuery {
    PostalCode { code: String, country: String },
    FreeText(String),
}

impl GeoQuery {
    /// Postal-code lookup when the address contains one, free text otherwise.
    pub fn from_address(address: &str, country: &str) -> Option<Self> {
        if let Some(code) = extract_zipcode(address) {
            return Some(GeoQuery::PostalCode {
                code,
                country: country.to_string(),
            });
        }
        let cleaned = remove_keywords(address);
        if cleaned.is_empty() {
            None
        } else {
            Some(GeoQuery::FreeText(cleaned))
        }
    }

    /// Stable key for the geocode cache
    pub fn cache_key(&self) -> String {
        match self {
            GeoQuery::PostalCode { code, country } => {
                format!("postalcode:{}:{}", code, country.to_lowercase())
            }
            GeoQuery::FreeText(text) => format!("q:{}", text.to_lowercase()),
        }
    }
}
