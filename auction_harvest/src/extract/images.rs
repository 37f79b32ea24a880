use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("constant selector is valid")
}

/// Attribute probes in priority order: full-size gallery, lazy-load, thumbnail.
static ATTRIBUTE_PROBES: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    ["data-src-pop", "data-src", "data-thumb"]
        .into_iter()
        .map(|attr| (selector(&format!("[{}]", attr)), attr))
        .collect()
});
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));

/// Gallery image URLs on a vehicle page that point into the asset store,
/// without query strings, deduplicated and sorted.
pub fn extract_image_urls(markup: &str, asset_prefix: &str) -> Vec<String> {
    let doc = Html::parse_document(markup);
    let mut urls = BTreeSet::new();

    for (sel, attr) in ATTRIBUTE_PROBES.iter() {
        for el in doc.select(sel) {
            if let Some(url) = el.value().attr(attr).and_then(|v| canonical(v, asset_prefix)) {
                urls.insert(url);
            }
        }
    }

    for img in doc.select(&IMG) {
        let v = img.value();
        let src = v
            .attr("src")
            .filter(|s| !s.trim().is_empty())
            .or_else(|| v.attr("data-src"))
            .or_else(|| v.attr("data-lazy-src"));
        if let Some(url) = src.and_then(|s| canonical(s, asset_prefix)) {
            urls.insert(url);
        }
    }

    urls.into_iter().collect()
}

fn canonical(raw: &str, asset_prefix: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.contains(asset_prefix) {
        return None;
    }
    let without_query = raw.split('?').next().unwrap_or(raw);
    if let Some(rest) = without_query.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    Some(without_query.to_string())
}
