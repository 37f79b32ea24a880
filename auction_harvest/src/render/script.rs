//! Interaction scripts: the page-specific sequence of browser steps.

use std::time::Duration;

use crate::config::{ms, HarvestConfig};

pub const AUCTION_ITEM_SELECTOR: &str = r#"tr[id^="auction_item_"]"#;
const AUCTION_CONTENT_SELECTOR: &str =
    r##"a[href*="#/auction/vehicleDetail/"], tr[id*="auction_item_"]"##;
const VEHICLE_CONTENT_SELECTOR: &str = r#"img, .viewphoto, [ng-click*="viewPhotos"]"#;
const VIEW_PHOTOS_SELECTOR: &str = r#"a.viewphoto, a[ng-click*="viewPhotos"], .viewphoto"#;
const MAIN_IMAGE_SELECTOR: &str = r#"img.vdp_img, img[ng-click*="viewPhotos"]"#;
const GALLERY_SELECTOR: &str = r#"#imageGallery, .gallery, [data-src-pop]"#;

/// Infinite-scroll settings for [`Action::ScrollUntilStable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPolicy {
    /// Selector whose match count measures how much has loaded.
    pub item_selector: String,
    /// Maximum number of scrolls that are allowed to grow the count.
    pub max_attempts: u32,
    pub wait: Duration,
    /// Extra scrolls tried when nothing is present after the initial load.
    pub empty_probes: u32,
    pub probe_wait: Duration,
    /// Time after which no further scroll is started. What has loaded by
    /// then is kept.
    pub budget: Duration,
}

impl ScrollPolicy {
    pub fn from_config(item_selector: &str, cfg: &HarvestConfig) -> Self {
        Self {
            item_selector: item_selector.to_string(),
            max_attempts: cfg.scroll.max_attempts,
            wait: ms(cfg.scroll.wait_ms),
            empty_probes: cfg.scroll.empty_probes,
            probe_wait: ms(cfg.scroll.probe_wait_ms),
            budget: ms(cfg.timeouts.step_ceiling_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate(String),
    Idle,
    ScrollUntilStable(ScrollPolicy),
    /// Clicks the first selector in the list that matches anything.
    ClickFirst(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFor {
    Nothing,
    Delay(Duration),
    /// Best effort: a miss is logged and the script continues.
    Selector { selector: String, timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub wait: WaitFor,
    /// Hard ceiling for the action and its wait together.
    pub timeout: Duration,
}

impl Step {
    pub fn new(action: Action, wait: WaitFor, timeout: Duration) -> Self {
        Self {
            action,
            wait,
            timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionScript {
    pub steps: Vec<Step>,
    /// Substrings that show real content was rendered. Empty accepts anything.
    pub content_markers: Vec<String>,
}

impl InteractionScript {
    pub fn has_content(&self, markup: &str) -> bool {
        self.content_markers.is_empty() || self.content_markers.iter().any(|m| markup.contains(m))
    }
}

/// `{base}/#/auctionDetail/{slug}`
pub fn auction_url(base_url: &str, slug: &str) -> String {
    format!("{}/#/auctionDetail/{}", base_url.trim_end_matches('/'), slug)
}

/// Resolves a vehicle link from the auction page against the site base.
pub fn vehicle_url(base_url: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if link.starts_with('#') || link.starts_with('/') {
        format!("{}{}", base, link)
    } else {
        format!("{}/{}", base, link)
    }
}

pub fn auction_page_script(url: &str, cfg: &HarvestConfig) -> InteractionScript {
    let ceiling = ms(cfg.timeouts.step_ceiling_ms);
    let settle = WaitFor::Delay(ms(cfg.delays.page_settle_ms));
    InteractionScript {
        steps: vec![
            Step::new(
                Action::Navigate(url.to_string()),
                settle.clone(),
                ms(cfg.timeouts.navigation_ms).saturating_add(ms(cfg.delays.page_settle_ms)),
            ),
            Step::new(
                Action::Idle,
                WaitFor::Selector {
                    selector: AUCTION_CONTENT_SELECTOR.to_string(),
                    timeout: ms(cfg.timeouts.content_ms),
                },
                ceiling,
            ),
            Step::new(Action::Idle, settle, ceiling),
            // The scroll ends itself at its budget; the step timeout only
            // catches a primitive that never returns.
            Step::new(
                Action::ScrollUntilStable(ScrollPolicy::from_config(AUCTION_ITEM_SELECTOR, cfg)),
                WaitFor::Nothing,
                ceiling.saturating_add(ms(cfg.timeouts.navigation_ms)),
            ),
        ],
        content_markers: vec![
            "auction_item_".to_string(),
            "#/auction/vehicleDetail/".to_string(),
        ],
    }
}

pub fn vehicle_page_script(url: &str, cfg: &HarvestConfig) -> InteractionScript {
    let ceiling = ms(cfg.timeouts.step_ceiling_ms);
    let detail_settle = WaitFor::Delay(ms(cfg.delays.detail_settle_ms));
    InteractionScript {
        steps: vec![
            Step::new(
                Action::Navigate(url.to_string()),
                WaitFor::Delay(ms(cfg.delays.page_settle_ms)),
                ms(cfg.timeouts.navigation_ms).saturating_add(ms(cfg.delays.page_settle_ms)),
            ),
            Step::new(
                Action::Idle,
                WaitFor::Selector {
                    selector: VEHICLE_CONTENT_SELECTOR.to_string(),
                    timeout: ms(cfg.timeouts.detail_ms),
                },
                ceiling,
            ),
            Step::new(Action::Idle, detail_settle.clone(), ceiling),
            Step::new(
                Action::ClickFirst(vec![
                    VIEW_PHOTOS_SELECTOR.to_string(),
                    MAIN_IMAGE_SELECTOR.to_string(),
                ]),
                WaitFor::Selector {
                    selector: GALLERY_SELECTOR.to_string(),
                    timeout: ms(cfg.timeouts.gallery_ms),
                },
                ceiling,
            ),
            Step::new(Action::Idle, detail_settle, ceiling),
        ],
        content_markers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auction_url_format() {
        assert_eq!(
            auction_url("https://auctions.cardekho.com/", "Gujarat-PSU-05Dec25"),
            "https://auctions.cardekho.com/#/auctionDetail/Gujarat-PSU-05Dec25"
        );
    }

    #[test]
    fn vehicle_url_variants() {
        let base = "https://auctions.cardekho.com";
        assert_eq!(
            vehicle_url(base, "#/auction/vehicleDetail/V1/22"),
            "https://auctions.cardekho.com#/auction/vehicleDetail/V1/22"
        );
        assert_eq!(
            vehicle_url(base, "/auction/x"),
            "https://auctions.cardekho.com/auction/x"
        );
        assert_eq!(vehicle_url(base, "a/b"), "https://auctions.cardekho.com/a/b");
        assert_eq!(vehicle_url(base, "https://cdn/x"), "https://cdn/x");
    }

    #[test]
    fn auction_script_ends_with_scroll() {
        let cfg = HarvestConfig::default();
        let script = auction_page_script("https://x/#/auctionDetail/a", &cfg);
        assert!(matches!(script.steps[0].action, Action::Navigate(_)));
        match &script.steps.last().unwrap().action {
            Action::ScrollUntilStable(p) => {
                assert_eq!(p.item_selector, AUCTION_ITEM_SELECTOR);
                assert_eq!(p.max_attempts, 50);
                assert_eq!(p.empty_probes, 5);
            }
            other => panic!("unexpected last step {:?}", other),
        }
        assert!(script.has_content("<tr id=\"auction_item_1\">"));
        assert!(!script.has_content("<p>nothing</p>"));
    }

    #[test]
    fn vehicle_script_accepts_any_markup() {
        let script = vehicle_page_script("u", &HarvestConfig::default());
        assert!(script.has_content(""));
        assert!(script
            .steps
            .iter()
            .any(|s| matches!(&s.action, Action::ClickFirst(sel) if sel.len() == 2)));
    }
}
