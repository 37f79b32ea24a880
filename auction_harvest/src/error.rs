//! Error types for the library layer.

use std::fmt;

use crate::checkpoint::PersistenceError;
use crate::render::RenderFailure;

/// Errors produced while setting up a harvest: configuration, the feed,
/// the checkpoint store, and the HTTP client used for image downloads.
///
/// Failures *during* a run never surface as `HarvestError`; they are
/// recorded on the affected unit instead.
#[derive(Debug)]
pub enum HarvestError {
    /// Configuration failed validation or could not be parsed.
    Config(String),
    /// The auction feed could not be read.
    Feed(auction_feed::FeedError),
    /// The checkpoint could not be read or written.
    Persistence(PersistenceError),
    /// The HTTP client could not be built.
    Http(reqwest::Error),
}

impl fmt::Display for HarvestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Config error: {}", msg),
            Self::Feed(e) => write!(f, "Feed error: {}", e),
            Self::Persistence(e) => write!(f, "Checkpoint error: {}", e),
            Self::Http(e) => write!(f, "HTTP client error: {}", e),
        }
    }
}

impl std::error::Error for HarvestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Feed(e) => Some(e),
            Self::Persistence(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Config(_) => None,
        }
    }
}

impl From<auction_feed::FeedError> for HarvestError {
    fn from(e: auction_feed::FeedError) -> Self {
        Self::Feed(e)
    }
}

impl From<PersistenceError> for HarvestError {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}

impl From<reqwest::Error> for HarvestError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// Why a single pipeline attempt for a unit did not produce vehicles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("render failed: {0}")]
    Render(#[from] RenderFailure),
    #[error("expected {expected} vehicles but the page yielded none")]
    ExtractionEmpty { expected: u32 },
    #[error("missing slug")]
    MissingSlug,
}
