//! Session context handed to the harvester for authenticated page loads.

use std::fmt;

use url::Url;

use crate::{user_agent::get_user_agent, FeedError};

/// Credentials for the auction site, as produced by the login stage.
///
/// The harvester treats this as opaque: it only installs the cookie pairs in
/// each fresh browser session and uses the user agent for every request.
#[derive(Clone)]
pub struct SessionContext {
    cookie: String,
    user_agent: String,
}

impl SessionContext {
    /// Builds a session from a raw `Cookie` header value.
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            user_agent: get_user_agent().to_string(),
        }
    }

    /// A session with no cookies, for public pages and tests.
    pub fn anonymous() -> Self {
        Self::new(String::new())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn is_authenticated(&self) -> bool {
        !self.cookie_pairs().is_empty()
    }

    /// Splits the cookie header into `(name, value)` pairs. Fragments without
    /// an `=` are dropped; values may themselves contain `=`.
    pub fn cookie_pairs(&self) -> Vec<(String, String)> {
        self.cookie
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("cookies", &self.cookie_pairs().len())
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Host name that session cookies are scoped to for a site base URL.
pub fn cookie_domain(base_url: &str) -> Result<String, FeedError> {
    let url = Url::parse(base_url).map_err(|_| FeedError::InvalidBaseUrl(base_url.to_string()))?;
    url.host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| FeedError::InvalidBaseUrl(base_url.to_string()))
}
