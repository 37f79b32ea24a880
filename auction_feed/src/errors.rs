//! Error types for the auction feed boundary.

/// Errors that can occur while reading the auction feed or building a session.
#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    /// The feed file could not be read.
    #[error("Failed to read feed {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The feed was not a JSON array of objects.
    #[error("Malformed feed: {0}")]
    Malformed(String),
    /// The site base URL could not be parsed or has no host.
    #[error("Invalid base URL {0}")]
    InvalidBaseUrl(String),
}
