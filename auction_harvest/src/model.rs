//! Data model persisted in the checkpoint.

use std::fmt;

use auction_feed::AuctionDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the latest attempt on a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Pending,
    Complete,
    Partial,
    NoMatch,
    Timeout,
    Failed,
}

impl UnitStatus {
    /// `complete` and `no_match` are final; everything attempted but not
    /// final may be retried.
    pub fn is_retry_eligible(self) -> bool {
        matches!(self, Self::Timeout | Self::Failed | Self::Partial)
    }

    /// Statuses the bounded sweep works on.
    pub fn is_sweep_eligible(self) -> bool {
        matches!(self, Self::Partial | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::NoMatch => "no_match",
            Self::Timeout => "timeout",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vehicle lot extracted from an auction page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vid: String,
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturing_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rc_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yard_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yard_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_link: Option<String>,
    #[serde(default, alias = "vehicleimages")]
    pub images: Vec<String>,
}

impl VehicleRecord {
    pub fn new(vid: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            vid: vid.into(),
            item_id: item_id.into(),
            ..Self::default()
        }
    }

    pub fn identity(&self) -> (&str, &str) {
        (&self.vid, &self.item_id)
    }

    /// Registration and make/model are both present.
    pub fn has_core_data(&self) -> bool {
        non_blank(&self.registration_number) && non_blank(&self.make_model)
    }
}

fn non_blank(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// One auction's processing record. The checkpoint is a JSON array of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionUnit {
    pub auction_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(rename = "vehicle_count", default)]
    pub expected: u32,
    #[serde(default)]
    pub status: UnitStatus,
    #[serde(default)]
    pub summary: String,
    #[serde(rename = "gj_vehicle_count", default)]
    pub filtered_count: u32,
    #[serde(default)]
    pub vehicles: Vec<VehicleRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<AuctionDescriptor> for AuctionUnit {
    fn from(d: AuctionDescriptor) -> Self {
        let slug = d.locator_slug();
        Self {
            auction_id: d.auction_id,
            title: d.title,
            slug,
            expected: d.vehicle_count,
            status: UnitStatus::Pending,
            summary: String::new(),
            filtered_count: 0,
            vehicles: Vec::new(),
            error: None,
            attempts: 0,
            updated_at: None,
        }
    }
}

impl AuctionUnit {
    pub fn images_total(&self) -> usize {
        self.vehicles.iter().map(|v| v.images.len()).sum()
    }
}

/// Side-list entry for units needing manual follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUnit {
    pub auction_id: String,
    pub title: String,
    pub slug: String,
    pub vehicle_count: u32,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AuctionUnit> for FailedUnit {
    fn from(u: &AuctionUnit) -> Self {
        Self {
            auction_id: u.auction_id.clone(),
            title: u.title.clone(),
            slug: u.slug.clone(),
            vehicle_count: u.expected,
            status: u.status,
            error: u.error.clone(),
        }
    }
}

/// Per-status counts over a set of units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub pending: usize,
    pub complete: usize,
    pub partial: usize,
    pub no_match: usize,
    pub timeout: usize,
    pub failed: usize,
}

impl StatusTally {
    pub fn from_units(units: &[AuctionUnit]) -> Self {
        let mut tally = Self::default();
        for u in units {
            match u.status {
                UnitStatus::Pending => tally.pending += 1,
                UnitStatus::Complete => tally.complete += 1,
                UnitStatus::Partial => tally.partial += 1,
                UnitStatus::NoMatch => tally.no_match += 1,
                UnitStatus::Timeout => tally.timeout += 1,
                UnitStatus::Failed => tally.failed += 1,
            }
        }
        tally
    }
}

/// What a run did, returned by the orchestrator and printed by the CLI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub statuses: StatusTally,
    pub vehicles_kept: usize,
    pub records_excluded: usize,
    pub images_downloaded: usize,
    pub images_skipped: usize,
    pub images_failed: usize,
    pub persistence_failures: usize,
    pub sweep_rounds_run: u32,
    /// Units still `failed`, `partial` or `timeout` after every round.
    pub unresolved: Vec<FailedUnit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_from_descriptor_is_pending() {
        let d = AuctionDescriptor::new("176639", "Gujarat PSU 05Dec25", "", 12);
        let unit = AuctionUnit::from(d);
        assert_eq!(unit.status, UnitStatus::Pending);
        assert_eq!(unit.slug, "Gujarat-PSU-05Dec25");
        assert_eq!(unit.expected, 12);
        assert_eq!(unit.attempts, 0);
    }

    #[test]
    fn unit_serializes_historical_keys() {
        let mut unit = AuctionUnit::from(AuctionDescriptor::new("1", "T", "t", 5));
        unit.filtered_count = 2;
        unit.status = UnitStatus::NoMatch;
        let v = serde_json::to_value(&unit).unwrap();
        assert_eq!(v["vehicle_count"], 5);
        assert_eq!(v["gj_vehicle_count"], 2);
        assert_eq!(v["status"], "no_match");
        assert!(v.get("error").is_none());
    }

    #[test]
    fn vehicle_accepts_legacy_image_key() {
        let json = r#"{"vid":"V1","item_id":"9","vehicleimages":["https://a/1.jpg"]}"#;
        let v: VehicleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(v.images, vec!["https://a/1.jpg".to_string()]);
        assert!(v.registration_number.is_none());
    }

    #[test]
    fn core_data_requires_both_fields() {
        let mut v = VehicleRecord::new("V", "1");
        v.registration_number = Some("GJ01AB1234".into());
        assert!(!v.has_core_data());
        v.make_model = Some("   ".into());
        assert!(!v.has_core_data());
        v.make_model = Some("Maruti Swift".into());
        assert!(v.has_core_data());
    }

    #[test]
    fn eligibility() {
        assert!(UnitStatus::Timeout.is_retry_eligible());
        assert!(!UnitStatus::Timeout.is_sweep_eligible());
        assert!(UnitStatus::Partial.is_sweep_eligible());
        assert!(UnitStatus::Failed.is_sweep_eligible());
        assert!(!UnitStatus::Complete.is_retry_eligible());
        assert!(!UnitStatus::NoMatch.is_retry_eligible());
    }

    #[test]
    fn tally_counts_each_status() {
        let mut a = AuctionUnit::from(AuctionDescriptor::new("1", "a", "a", 1));
        let mut b = a.clone();
        let c = a.clone();
        a.status = UnitStatus::Complete;
        b.status = UnitStatus::Failed;
        let t = StatusTally::from_units(&[a, b, c]);
        assert_eq!(t.complete, 1);
        assert_eq!(t.failed, 1);
        assert_eq!(t.pending, 1);
    }
}
