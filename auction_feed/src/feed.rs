//! Reading the auction descriptor feed produced by the discovery stage.

use std::path::Path;

use crate::{types::AuctionDescriptor, FeedError};

/// Reads a JSON array of auction descriptors from `path`.
///
/// Entries that cannot be read as a descriptor (for example, no auction id)
/// are skipped with a warning rather than failing the whole feed.
pub fn load_descriptors(path: &Path) -> Result<Vec<AuctionDescriptor>, FeedError> {
    let body = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_descriptors(&body)
}

/// Parses a JSON array of auction descriptors.
pub fn parse_descriptors(body: &str) -> Result<Vec<AuctionDescriptor>, FeedError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;
    let serde_json::Value::Array(items) = value else {
        return Err(FeedError::Malformed("expected a JSON array".into()));
    };

    let mut descriptors = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<AuctionDescriptor>(item) {
            Ok(d) => descriptors.push(d),
            Err(e) => tracing::warn!("Skipping feed entry {}: {}", idx + 1, e),
        }
    }
    Ok(descriptors)
}
