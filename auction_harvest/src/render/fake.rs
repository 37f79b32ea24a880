//! Scripted in-memory browser for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::script::AUCTION_ITEM_SELECTOR;
use super::{BrowserDriver, BrowserSession, DriverError};

#[derive(Debug, Clone)]
pub(crate) enum FakePage {
    Loaded {
        /// Item count after 0, 1, 2, ... scrolls; the last value repeats.
        counts: Vec<usize>,
        html: String,
        clickable: Vec<String>,
    },
    NavTimeout,
    NetworkDown,
    Hang,
}

impl FakePage {
    pub fn items(counts: Vec<usize>) -> Self {
        Self::Loaded {
            counts,
            html: r#"<table><tr id="auction_item_1"></tr></table>"#.to_string(),
            clickable: Vec::new(),
        }
    }

    pub fn html(html: &str) -> Self {
        Self::items(vec![1]).with_html(html)
    }

    pub fn with_html(self, markup: &str) -> Self {
        match self {
            Self::Loaded {
                counts, clickable, ..
            } => Self::Loaded {
                counts,
                html: markup.to_string(),
                clickable,
            },
            other => other,
        }
    }

    pub fn clickable(self, selector: &str) -> Self {
        match self {
            Self::Loaded {
                counts,
                html,
                mut clickable,
            } => {
                clickable.push(selector.to_string());
                Self::Loaded {
                    counts,
                    html,
                    clickable,
                }
            }
            other => other,
        }
    }
}

#[derive(Default)]
struct State {
    routes: HashMap<String, VecDeque<FakePage>>,
    opens: usize,
    closes: usize,
    scrolls: usize,
    clicks: Vec<String>,
    navigations: Vec<String>,
}

/// Each navigation to a URL consumes the next queued page; the last one
/// queued keeps being served.
#[derive(Clone, Default)]
pub(crate) struct FakeDriver {
    state: Arc<Mutex<State>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, page: FakePage) {
        self.route_sequence(url, vec![page]);
    }

    pub fn route_sequence(&self, url: &str, pages: Vec<FakePage>) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(url.to_string(), pages.into());
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn visits(&self, url: &str) -> usize {
        self.navigations().iter().filter(|u| *u == url).count()
    }

    fn next_page(&self, url: &str) -> Option<FakePage> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        let queue = state.routes.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        self.state.lock().unwrap().opens += 1;
        Ok(Box::new(FakeSession {
            driver: self.clone(),
            page: None,
            scroll_idx: 0,
        }))
    }
}

struct FakeSession {
    driver: FakeDriver,
    page: Option<FakePage>,
    scroll_idx: usize,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        match self.driver.next_page(url) {
            None => Err(DriverError::Network(format!("no route for {}", url))),
            Some(FakePage::NavTimeout) => Err(DriverError::Timeout("navigation".into())),
            Some(FakePage::NetworkDown) => Err(DriverError::Network("connection reset".into())),
            Some(FakePage::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Some(page) => {
                self.page = Some(page);
                Ok(())
            }
        }
    }

    async fn count(&mut self, selector: &str) -> Result<usize, DriverError> {
        let Some(FakePage::Loaded { counts, html, .. }) = &self.page else {
            return Ok(0);
        };
        if selector == AUCTION_ITEM_SELECTOR {
            let idx = self.scroll_idx.min(counts.len().saturating_sub(1));
            return Ok(counts.get(idx).copied().unwrap_or(0));
        }
        Ok(usize::from(!html.is_empty()))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.scroll_idx += 1;
        self.driver.state.lock().unwrap().scrolls += 1;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<bool, DriverError> {
        let Some(FakePage::Loaded { clickable, .. }) = &self.page else {
            return Ok(false);
        };
        if clickable.iter().any(|s| s == selector) {
            self.driver
                .state
                .lock()
                .unwrap()
                .clicks
                .push(selector.to_string());
            return Ok(true);
        }
        Ok(false)
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        match &self.page {
            Some(FakePage::Loaded { html, .. }) => Ok(html.clone()),
            _ => Ok(String::new()),
        }
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.driver.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
