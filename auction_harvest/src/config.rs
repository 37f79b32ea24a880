//! Run configuration: defaults, optional TOML file, environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

pub const DEFAULT_BASE_URL: &str = "https://auctions.cardekho.com";
pub const DEFAULT_ASSET_PREFIX: &str = "auctionscdn.cardekho.com/auctionuploads/";

/// Every tunable of the pipeline. Threaded explicitly through each component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarvestConfig {
    pub filter: FilterConfig,
    pub site: SiteConfig,
    pub images: ImageConfig,
    pub retries: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub scroll: ScrollConfig,
    pub delays: DelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub region_prefix: String,
    pub rc_phrase: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            region_prefix: "GJ".to_string(),
            rc_phrase: "with papers".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Host/path fragment every accepted image URL must contain.
    pub asset_prefix: String,
    pub headless: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    pub max_per_vehicle: usize,
    pub workers: usize,
    pub download: bool,
    pub download_timeout_ms: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_per_vehicle: 30,
            workers: 10,
            download: true,
            download_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub render_attempts: u32,
    /// Delay before attempt `n` (n >= 2) is `backoff_base_ms * 2^n`.
    pub backoff_base_ms: u64,
    pub image_attempts: u32,
    pub sweep_rounds: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            render_attempts: 3,
            backoff_base_ms: 1_000,
            image_attempts: 2,
            sweep_rounds: 3,
        }
    }
}

impl RetryConfig {
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << shift))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_ms: u64,
    pub content_ms: u64,
    pub detail_ms: u64,
    pub gallery_ms: u64,
    /// Upper bound for any single script step that does not set its own.
    pub step_ceiling_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 90_000,
            content_ms: 20_000,
            detail_ms: 15_000,
            gallery_ms: 5_000,
            step_ceiling_ms: 180_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrollConfig {
    pub max_attempts: u32,
    pub wait_ms: u64,
    pub empty_probes: u32,
    pub probe_wait_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            wait_ms: 2_000,
            empty_probes: 5,
            probe_wait_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DelayConfig {
    pub page_settle_ms: u64,
    pub detail_settle_ms: u64,
    pub between_units_ms: u64,
    pub between_vehicles_ms: u64,
    pub image_retry_ms: u64,
    pub between_rounds_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            page_settle_ms: 3_000,
            detail_settle_ms: 2_000,
            between_units_ms: 2_000,
            between_vehicles_ms: 1_000,
            image_retry_ms: 2_000,
            between_rounds_ms: 3_000,
        }
    }
}

impl HarvestConfig {
    /// Defaults, then `path` (if given), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, HarvestError> {
        let base = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, HarvestError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, HarvestError> {
        toml::from_str(raw).map_err(|e| HarvestError::Config(e.to_string()))
    }

    /// Applies `HARVEST_*` and `IMAGE_COUNT` variables on top of `self`.
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_string("HARVEST_REGION_PREFIX") {
            self.filter.region_prefix = v;
        }
        if let Some(v) = env_string("HARVEST_RC_PHRASE") {
            self.filter.rc_phrase = v;
        }
        if let Some(v) = env_string("HARVEST_BASE_URL") {
            self.site.base_url = v;
        }
        self.images.max_per_vehicle = env_usize("IMAGE_COUNT", self.images.max_per_vehicle);
        self.images.workers = env_usize("HARVEST_WORKERS", self.images.workers);
        self.retries.render_attempts =
            env_u32("HARVEST_RENDER_ATTEMPTS", self.retries.render_attempts);
        self.retries.sweep_rounds = env_u32("HARVEST_SWEEP_ROUNDS", self.retries.sweep_rounds);
        self
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.images.workers == 0 {
            return Err(HarvestError::Config("images.workers must be at least 1".into()));
        }
        if self.images.max_per_vehicle == 0 {
            return Err(HarvestError::Config(
                "images.max_per_vehicle must be at least 1".into(),
            ));
        }
        if self.retries.render_attempts == 0 {
            return Err(HarvestError::Config(
                "retries.render_attempts must be at least 1".into(),
            ));
        }
        if self.filter.region_prefix.trim().is_empty() {
            return Err(HarvestError::Config("filter.region_prefix is empty".into()));
        }
        if url::Url::parse(&self.site.base_url).is_err() {
            return Err(HarvestError::Config(format!(
                "site.base_url is not a URL: {}",
                self.site.base_url
            )));
        }
        Ok(())
    }

    /// Zero-delay copy for tests.
    pub fn without_delays(mut self) -> Self {
        self.delays = DelayConfig {
            page_settle_ms: 0,
            detail_settle_ms: 0,
            between_units_ms: 0,
            between_vehicles_ms: 0,
            image_retry_ms: 0,
            between_rounds_ms: 0,
        };
        self.scroll.wait_ms = 0;
        self.scroll.probe_wait_ms = 0;
        self.retries.backoff_base_ms = 0;
        self
    }
}

pub(crate) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<u32>().ok())
        .unwrap_or(default)
}
