//! Parsing rendered markup into vehicle records and gallery image URLs.

mod images;
mod records;

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

pub use images::extract_image_urls;
pub use records::{extract_records, yard_details, YardDetails};

static LEADING_BULLETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[•\s]+").expect("constant regex pattern is valid"));

/// Element text with surrounding whitespace and leading bullet glyphs removed.
/// `None` when nothing is left.
pub(crate) fn clean_text(el: ElementRef<'_>) -> Option<String> {
    let raw: String = el.text().collect();
    let cleaned = LEADING_BULLETS.replace(raw.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
