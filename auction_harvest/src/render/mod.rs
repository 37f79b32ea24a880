//! Headless-browser rendering of the auction SPA.
//!
//! A [`Renderer`] runs an [`InteractionScript`] against a fresh
//! [`BrowserSession`] per attempt, retrying with exponential backoff on
//! timeouts and transport errors. The automation engine itself sits behind
//! [`BrowserDriver`], so scripts can be exercised without a real browser.

mod chromium;
#[cfg(test)]
pub(crate) mod fake;
pub mod script;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::RetryConfig;

pub use chromium::ChromiumDriver;
pub use script::{
    auction_page_script, auction_url, vehicle_page_script, vehicle_url, Action,
    InteractionScript, ScrollPolicy, Step, WaitFor,
};

const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Failure of a single automation primitive.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    Other(String),
}

/// Why a render gave up after all attempts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unknown: {0}")]
    Unknown(String),
}

impl From<DriverError> for RenderFailure {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Timeout(m) => Self::Timeout(m),
            DriverError::Network(m) => Self::Network(m),
            DriverError::Other(m) => Self::Unknown(m),
        }
    }
}

/// Starts isolated browsing sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError>;
}

/// The primitives a script is executed with.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;
    /// Number of elements currently matching `selector`.
    async fn count(&mut self, selector: &str) -> Result<usize, DriverError>;
    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError>;
    /// Clicks the first element matching `selector`. `Ok(false)` when none matched.
    async fn click(&mut self, selector: &str) -> Result<bool, DriverError>;
    async fn content(&mut self) -> Result<String, DriverError>;
    async fn close(&mut self) -> Result<(), DriverError>;
}

pub struct Renderer<D> {
    driver: D,
    retries: RetryConfig,
}

impl<D: BrowserDriver> Renderer<D> {
    pub fn new(driver: D, retries: &RetryConfig) -> Self {
        Self {
            driver,
            retries: retries.clone(),
        }
    }

    /// Renders the page the script navigates to.
    ///
    /// Markup without any of the script's content markers is retried like a
    /// failure, but on the last attempt it is returned as-is so the caller
    /// can decide whether it holds data.
    pub async fn render(
        &self,
        label: &str,
        script: &InteractionScript,
    ) -> Result<String, RenderFailure> {
        let attempts = self.retries.render_attempts.max(1);
        let mut last_failure = RenderFailure::Unknown("no attempt made".to_string());

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.retries.backoff_before(attempt);
                tracing::info!(
                    "{}: retry {}/{} in {:.1}s",
                    label,
                    attempt,
                    attempts,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(script).await {
                Ok(markup) if script.has_content(&markup) => {
                    if attempt > 1 {
                        tracing::info!("{}: loaded on attempt {}", label, attempt);
                    }
                    return Ok(markup);
                }
                Ok(markup) => {
                    if attempt == attempts {
                        tracing::warn!(
                            "{}: content markers missing after {} attempts, using last markup",
                            label,
                            attempts
                        );
                        return Ok(markup);
                    }
                    tracing::warn!(
                        "{}: content markers missing (attempt {}/{})",
                        label,
                        attempt,
                        attempts
                    );
                }
                Err(e) => {
                    tracing::warn!("{}: attempt {}/{} failed: {}", label, attempt, attempts, e);
                    last_failure = e.into();
                }
            }
        }

        tracing::error!("{}: giving up after {} attempts: {}", label, attempts, last_failure);
        Err(last_failure)
    }

    async fn attempt(&self, script: &InteractionScript) -> Result<String, DriverError> {
        let mut session = self.driver.open().await?;
        let result = run_script(session.as_mut(), script).await;
        if let Err(e) = session.close().await {
            tracing::debug!("session close failed: {}", e);
        }
        result
    }
}

/// Executes every step, then returns the page markup.
pub async fn run_script(
    session: &mut dyn BrowserSession,
    script: &InteractionScript,
) -> Result<String, DriverError> {
    for step in &script.steps {
        match tokio::time::timeout(step.timeout, run_step(session, step)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DriverError::Timeout(format!(
                    "{} exceeded {:.0}s",
                    action_label(&step.action),
                    step.timeout.as_secs_f64()
                )))
            }
        }
    }
    session.content().await
}

fn action_label(action: &Action) -> &'static str {
    match action {
        Action::Navigate(_) => "navigation",
        Action::Idle => "wait",
        Action::ScrollUntilStable(_) => "scroll",
        Action::ClickFirst(_) => "click",
    }
}

async fn run_step(session: &mut dyn BrowserSession, step: &Step) -> Result<(), DriverError> {
    let proceed = match &step.action {
        Action::Navigate(url) => {
            tracing::debug!("navigate {}", url);
            session.navigate(url).await?;
            true
        }
        Action::Idle => true,
        Action::ScrollUntilStable(policy) => {
            let loaded = scroll_until_stable(session, policy).await?;
            tracing::debug!("scroll settled at {} items", loaded);
            true
        }
        Action::ClickFirst(selectors) => click_first(session, selectors).await,
    };
    if proceed {
        wait(session, &step.wait).await?;
    }
    Ok(())
}

/// Scrolls until the item count stops growing, the ceiling is hit or the
/// policy's time budget runs out. Returns the final count.
pub async fn scroll_until_stable(
    session: &mut dyn BrowserSession,
    policy: &ScrollPolicy,
) -> Result<usize, DriverError> {
    let deadline = Instant::now() + policy.budget;
    let mut current = session.count(&policy.item_selector).await?;

    if current == 0 {
        for probe in 1..=policy.empty_probes {
            if Instant::now() >= deadline {
                break;
            }
            session.scroll_to_bottom().await?;
            tokio::time::sleep(policy.probe_wait).await;
            current = session.count(&policy.item_selector).await?;
            if current > 0 {
                tracing::debug!("items appeared after probe {}", probe);
                break;
            }
        }
    }

    let mut grown = 0;
    while grown < policy.max_attempts {
        if Instant::now() >= deadline {
            tracing::debug!(
                "scroll budget spent after {} scrolls, keeping {} items",
                grown,
                current
            );
            break;
        }
        let previous = current;
        session.scroll_to_bottom().await?;
        tokio::time::sleep(policy.wait).await;
        current = session.count(&policy.item_selector).await?;
        if current == previous {
            break;
        }
        grown += 1;
    }
    Ok(current)
}

/// Returns whether anything was clicked. Click errors are not fatal.
async fn click_first(session: &mut dyn BrowserSession, selectors: &[String]) -> bool {
    for selector in selectors {
        match session.click(selector).await {
            Ok(true) => return true,
            Ok(false) => continue,
            Err(e) => {
                tracing::debug!("click on {} failed: {}", selector, e);
                return false;
            }
        }
    }
    false
}

async fn wait(session: &mut dyn BrowserSession, wait: &WaitFor) -> Result<(), DriverError> {
    match wait {
        WaitFor::Nothing => Ok(()),
        WaitFor::Delay(d) => {
            tokio::time::sleep(*d).await;
            Ok(())
        }
        WaitFor::Selector { selector, timeout } => {
            if !wait_for_selector(session, selector, *timeout).await? {
                tracing::debug!("selector {} not present after {:?}", selector, timeout);
            }
            Ok(())
        }
    }
}

async fn wait_for_selector(
    session: &mut dyn BrowserSession,
    selector: &str,
    timeout: Duration,
) -> Result<bool, DriverError> {
    let deadline = Instant::now() + timeout;
    loop {
        if session.count(selector).await? > 0 {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(SELECTOR_POLL.min(deadline - now)).await;
    }
}
