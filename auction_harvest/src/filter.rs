//! Record filtering and per-unit classification.

use crate::config::FilterConfig;
use crate::model::{UnitStatus, VehicleRecord};

/// Keeps records registered in the configured region whose RC status
/// carries the qualifying phrase. Both comparisons ignore case.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    region_prefix: String,
    rc_phrase: String,
}

impl RecordFilter {
    pub fn new(region_prefix: &str, rc_phrase: &str) -> Self {
        Self {
            region_prefix: region_prefix.trim().to_uppercase(),
            rc_phrase: rc_phrase.trim().to_lowercase(),
        }
    }

    pub fn from_config(cfg: &FilterConfig) -> Self {
        Self::new(&cfg.region_prefix, &cfg.rc_phrase)
    }

    pub fn qualifies(&self, record: &VehicleRecord) -> bool {
        let reg = record
            .registration_number
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        let rc = record.rc_status.as_deref().unwrap_or_default().to_lowercase();
        reg.starts_with(&self.region_prefix) && rc.contains(&self.rc_phrase)
    }

    /// Splits `records` into `(qualifying, excluded_count)`, preserving order.
    pub fn apply(&self, records: Vec<VehicleRecord>) -> (Vec<VehicleRecord>, usize) {
        let total = records.len();
        let kept: Vec<VehicleRecord> = records.into_iter().filter(|r| self.qualifies(r)).collect();
        let excluded = total - kept.len();
        (kept, excluded)
    }
}

/// Counts the classifier works from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitCounts {
    pub expected: u32,
    pub loaded: u32,
    pub filtered: u32,
    pub with_data: u32,
    pub with_images: u32,
}

impl UnitCounts {
    pub fn from_records(expected: u32, loaded: usize, kept: &[VehicleRecord]) -> Self {
        Self {
            expected,
            loaded: loaded as u32,
            filtered: kept.len() as u32,
            with_data: kept.iter().filter(|v| v.has_core_data()).count() as u32,
            with_images: kept.iter().filter(|v| !v.images.is_empty()).count() as u32,
        }
    }
}

/// Pure status decision. Precedence follows the order of the arms.
pub fn classify(render_ok: bool, c: &UnitCounts) -> UnitStatus {
    if !render_ok {
        return UnitStatus::Failed;
    }
    if c.loaded == 0 && c.expected > 0 {
        return UnitStatus::Timeout;
    }
    if c.expected == c.loaded && c.filtered > 0 && c.with_images == c.filtered {
        return UnitStatus::Complete;
    }
    if c.filtered > 0 && c.with_images == c.filtered {
        return UnitStatus::Partial;
    }
    if c.filtered > 0 {
        return UnitStatus::Partial;
    }
    UnitStatus::NoMatch
}

pub fn summary(status: UnitStatus, c: &UnitCounts) -> String {
    format!(
        "Status: {} - Expected: {}, Loaded: {}, Filtered: {}, With Data: {}, With Images: {}",
        status.as_str().to_uppercase(),
        c.expected,
        c.loaded,
        c.filtered,
        c.with_data,
        c.with_images
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(reg: &str, rc: &str) -> VehicleRecord {
        let mut v = VehicleRecord::new("V", reg);
        v.registration_number = Some(reg.to_string());
        v.rc_status = Some(rc.to_string());
        v
    }

    fn counts(expected: u32, loaded: u32, filtered: u32, with_images: u32) -> UnitCounts {
        UnitCounts {
            expected,
            loaded,
            filtered,
            with_data: filtered,
            with_images,
        }
    }

    #[test]
    fn qualifies_is_case_insensitive() {
        let f = RecordFilter::new("GJ", "with papers");
        assert!(f.qualifies(&record("gj01ab1234", "RC Available With Papers")));
        assert!(!f.qualifies(&record("MH01AB1234", "with papers")));
        assert!(!f.qualifies(&record("GJ01AB1234", "without papers")));
        assert!(!f.qualifies(&VehicleRecord::new("V", "1")));
    }

    #[test]
    fn apply_counts_exclusions() {
        let f = RecordFilter::new("GJ", "with papers");
        let (kept, excluded) = f.apply(vec![
            record("GJ05AA0001", "with papers"),
            record("RJ05AA0001", "with papers"),
            record("GJ05AA0002", "with papers"),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(excluded, 1);
        assert_eq!(kept[1].registration_number.as_deref(), Some("GJ05AA0002"));
    }

    #[test]
    fn scenarios() {
        assert_eq!(classify(true, &counts(5, 5, 3, 3)), UnitStatus::Complete);
        assert_eq!(classify(true, &counts(5, 0, 0, 0)), UnitStatus::Timeout);
        assert_eq!(classify(true, &counts(5, 5, 0, 0)), UnitStatus::NoMatch);
        assert_eq!(classify(true, &counts(5, 5, 3, 1)), UnitStatus::Partial);
        assert_eq!(classify(true, &counts(5, 4, 3, 3)), UnitStatus::Partial);
        assert_eq!(classify(false, &counts(5, 5, 3, 3)), UnitStatus::Failed);
        assert_eq!(classify(true, &counts(0, 0, 0, 0)), UnitStatus::NoMatch);
    }

    #[test]
    fn summary_format() {
        let c = UnitCounts {
            expected: 5,
            loaded: 4,
            filtered: 2,
            with_data: 1,
            with_images: 2,
        };
        assert_eq!(
            summary(UnitStatus::NoMatch, &c),
            "Status: NO_MATCH - Expected: 5, Loaded: 4, Filtered: 2, With Data: 1, With Images: 2"
        );
    }

    proptest! {
        #[test]
        fn classify_is_deterministic_and_follows_precedence(
            render_ok in any::<bool>(),
            expected in 0u32..20,
            loaded in 0u32..20,
            filtered in 0u32..20,
            with_images in 0u32..20,
        ) {
            let c = counts(expected, loaded, filtered, with_images);
            let status = classify(render_ok, &c);
            prop_assert_eq!(status, classify(render_ok, &c));

            let want = if !render_ok {
                UnitStatus::Failed
            } else if loaded == 0 && expected > 0 {
                UnitStatus::Timeout
            } else if filtered > 0 && with_images == filtered && expected == loaded {
                UnitStatus::Complete
            } else if filtered > 0 {
                UnitStatus::Partial
            } else {
                UnitStatus::NoMatch
            };
            prop_assert_eq!(status, want);
        }

        #[test]
        fn filter_is_idempotent(
            regs in proptest::collection::vec("(GJ|gj|MH|RJ)[0-9]{2}[A-Z]{2}[0-9]{4}", 0..12),
            with_papers in proptest::collection::vec(any::<bool>(), 12),
        ) {
            let f = RecordFilter::new("GJ", "with papers");
            let records: Vec<VehicleRecord> = regs
                .iter()
                .zip(with_papers.iter())
                .map(|(r, p)| record(r, if *p { "With Papers" } else { "Scrap" }))
                .collect();
            let (once, _) = f.apply(records);
            let (twice, excluded) = f.apply(once.clone());
            prop_assert_eq!(excluded, 0);
            prop_assert_eq!(once, twice);
        }
    }
}
