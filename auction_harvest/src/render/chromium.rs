//! [`BrowserDriver`] backed by a local Chromium through chromiumoxide.

use std::time::Duration;

use async_trait::async_trait;
use auction_feed::{cookie_domain, SessionContext};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use super::{BrowserDriver, BrowserSession, DriverError};
use crate::config::{ms, SiteConfig, TimeoutConfig};
use crate::error::HarvestError;

const SCROLL_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Launches one browser process per session, each on its own throwaway
/// profile, with the session's cookies installed for the site domain and a
/// desktop Chrome user agent.
pub struct ChromiumDriver {
    session: SessionContext,
    base_url: String,
    domain: String,
    headless: bool,
    request_timeout: Duration,
}

impl ChromiumDriver {
    pub fn new(
        session: SessionContext,
        site: &SiteConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, HarvestError> {
        let domain = cookie_domain(&site.base_url)?;
        Ok(Self {
            session,
            base_url: site.base_url.trim_end_matches('/').to_string(),
            domain,
            headless: site.headless,
            request_timeout: ms(timeouts.navigation_ms),
        })
    }

    fn cookies(&self) -> Result<Vec<CookieParam>, DriverError> {
        self.session
            .cookie_pairs()
            .into_iter()
            .map(|(name, value)| {
                CookieParam::builder()
                    .name(name)
                    .value(value)
                    .domain(self.domain.clone())
                    .path("/")
                    .build()
                    .map_err(DriverError::Other)
            })
            .collect()
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        let profile = profile_dir()?;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .request_timeout(self.request_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Other)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(map_cdp)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromiumSession {
            browser,
            page: None,
            handler,
            _profile: profile,
        };
        if let Err(e) = session.prepare(self).await {
            if let Err(close_err) = session.close().await {
                tracing::debug!("browser close after failed setup: {}", close_err);
            }
            return Err(e);
        }
        Ok(Box::new(session))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    /// Removed from disk when the session is dropped.
    _profile: TempDir,
}

fn profile_dir() -> Result<TempDir, DriverError> {
    tempfile::Builder::new()
        .prefix("auction-harvest-profile-")
        .tempdir()
        .map_err(|e| DriverError::Other(format!("browser profile: {}", e)))
}

impl ChromiumSession {
    async fn prepare(&mut self, driver: &ChromiumDriver) -> Result<(), DriverError> {
        let page = self.browser.new_page("about:blank").await.map_err(map_cdp)?;

        page.set_user_agent(SetUserAgentOverrideParams::new(
            driver.session.user_agent().to_string(),
        ))
        .await
        .map_err(map_cdp)?;

        let headers = Headers::new(serde_json::json!({
            "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            "Accept-Language": "en-US,en;q=0.9",
            "Referer": format!("{}/", driver.base_url),
        }));
        page.execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .map_err(map_cdp)?;

        let cookies = driver.cookies()?;
        if !cookies.is_empty() {
            page.set_cookies(cookies).await.map_err(map_cdp)?;
        }

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.page
            .as_ref()
            .ok_or_else(|| DriverError::Other("session has no page".into()))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.page()?.goto(url).await.map_err(map_cdp)?;
        Ok(())
    }

    async fn count(&mut self, selector: &str) -> Result<usize, DriverError> {
        let quoted =
            serde_json::to_string(selector).map_err(|e| DriverError::Other(e.to_string()))?;
        let result = self
            .page()?
            .evaluate(format!("document.querySelectorAll({}).length", quoted))
            .await
            .map_err(map_cdp)?;
        let n: f64 = result
            .into_value()
            .map_err(|e| DriverError::Other(e.to_string()))?;
        Ok(n.max(0.0) as usize)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.page()?.evaluate(SCROLL_JS).await.map_err(map_cdp)?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<bool, DriverError> {
        if self.count(selector).await? == 0 {
            return Ok(false);
        }
        let element = self.page()?.find_element(selector).await.map_err(map_cdp)?;
        element.click().await.map_err(map_cdp)?;
        Ok(true)
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.page()?.content().await.map_err(map_cdp)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.page = None;
        let closed = self.browser.close().await.map(|_| ()).map_err(map_cdp);
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("browser process wait failed: {}", e);
        }
        self.handler.abort();
        closed
    }
}

fn map_cdp(e: CdpError) -> DriverError {
    match e {
        CdpError::Timeout => DriverError::Timeout(e.to_string()),
        CdpError::Ws(_) | CdpError::Io(_) => DriverError::Network(e.to_string()),
        other => {
            let msg = other.to_string();
            if msg.contains("net::ERR") {
                DriverError::Network(msg)
            } else {
                DriverError::Other(msg)
            }
        }
    }
}
