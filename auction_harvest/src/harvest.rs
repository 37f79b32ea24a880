//! Recovery orchestrator: sequences render, extraction, filtering and image
//! collection over every auction unit, checkpointing after each one.
//!
//! A run is a main pass over pending units, one requeue of units that timed
//! out, then a bounded sweep over units left `partial` or `failed`. All three
//! are the same [`Harvester::run_pass`] with a different [`Pass`].

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;

use crate::checkpoint::CheckpointStore;
use crate::config::{ms, HarvestConfig};
use crate::download::{
    plan_vehicle_download, sanitize_registration, select_images, write_metadata, DownloadReport,
    ImageDownloader,
};
use crate::error::AttemptFailure;
use crate::extract::{extract_image_urls, extract_records};
use crate::filter::{classify, summary, RecordFilter, UnitCounts};
use crate::model::{
    AuctionUnit, FailedUnit, RunReport, StatusTally, UnitStatus, VehicleRecord,
};
use crate::render::{
    auction_page_script, auction_url, vehicle_page_script, vehicle_url, BrowserDriver, Renderer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Main,
    TimeoutRequeue,
    Sweep { round: u32 },
}

impl Pass {
    /// Whether a unit ending this pass with `status` moves on to a later pass.
    /// Once in the sweep, a unit only leaves it by reaching a final status.
    fn carries_forward(self, status: UnitStatus) -> bool {
        match self {
            Pass::Main | Pass::Sweep { .. } => status.is_retry_eligible(),
            Pass::TimeoutRequeue => status.is_sweep_eligible(),
        }
    }

    fn label(self) -> String {
        match self {
            Pass::Main => "main pass".to_string(),
            Pass::TimeoutRequeue => "timeout requeue".to_string(),
            Pass::Sweep { round } => format!("sweep round {}", round),
        }
    }
}

/// Builds the unit list for a run. Units already in `resumed` keep their
/// state; feed entries not seen before start `pending`. Checkpointed units
/// missing from the feed are kept at the end.
pub fn merge_resumed(
    feed: Vec<auction_feed::AuctionDescriptor>,
    resumed: Option<Vec<AuctionUnit>>,
) -> Vec<AuctionUnit> {
    let Some(resumed) = resumed else {
        return feed.into_iter().map(AuctionUnit::from).collect();
    };
    let mut by_id: HashMap<String, AuctionUnit> = HashMap::new();
    let mut order = Vec::new();
    for unit in resumed {
        order.push(unit.auction_id.clone());
        by_id.insert(unit.auction_id.clone(), unit);
    }

    let mut units = Vec::with_capacity(feed.len().max(by_id.len()));
    for descriptor in feed {
        match by_id.remove(&descriptor.auction_id) {
            Some(unit) => units.push(unit),
            None => units.push(AuctionUnit::from(descriptor)),
        }
    }
    for id in order {
        if let Some(unit) = by_id.remove(&id) {
            units.push(unit);
        }
    }
    units
}

struct UnitKey {
    auction_id: String,
    title: String,
    slug: String,
    expected: u32,
}

struct AttemptOutcome {
    status: UnitStatus,
    counts: UnitCounts,
    vehicles: Vec<VehicleRecord>,
    excluded: usize,
    failure: Option<AttemptFailure>,
}

impl AttemptOutcome {
    fn failed(expected: u32, failure: AttemptFailure) -> Self {
        Self {
            status: UnitStatus::Failed,
            counts: UnitCounts {
                expected,
                ..UnitCounts::default()
            },
            vehicles: Vec::new(),
            excluded: 0,
            failure: Some(failure),
        }
    }
}

struct ImageExport {
    downloader: ImageDownloader,
    root: PathBuf,
}

pub struct Harvester<D> {
    units: Vec<AuctionUnit>,
    renderer: Renderer<D>,
    filter: RecordFilter,
    config: HarvestConfig,
    store: CheckpointStore,
    export: Option<ImageExport>,
    /// Sanitized registration -> the `(vid, item_id)` that owns its directory.
    seen: HashMap<String, (String, String)>,
    excluded: HashMap<usize, usize>,
    report: RunReport,
}

impl<D: BrowserDriver> Harvester<D> {
    pub fn new(
        units: Vec<AuctionUnit>,
        driver: D,
        config: HarvestConfig,
        store: CheckpointStore,
    ) -> Self {
        Self {
            units,
            renderer: Renderer::new(driver, &config.retries),
            filter: RecordFilter::from_config(&config.filter),
            config,
            store,
            export: None,
            seen: HashMap::new(),
            excluded: HashMap::new(),
            report: RunReport::default(),
        }
    }

    /// Enables image downloads into `root`.
    pub fn with_image_export(
        mut self,
        downloader: ImageDownloader,
        root: impl Into<PathBuf>,
    ) -> Self {
        self.export = Some(ImageExport {
            downloader,
            root: root.into(),
        });
        self
    }

    pub fn units(&self) -> &[AuctionUnit] {
        &self.units
    }

    /// Runs every round and returns what happened. Nothing in here fails the
    /// run: unit failures are recorded on the unit, persistence failures are
    /// logged and counted.
    pub async fn run(&mut self) -> RunReport {
        let pending = self.indices(|s| s == UnitStatus::Pending);
        let mut carried = self.indices(UnitStatus::is_retry_eligible);
        tracing::info!(
            "Harvesting {} units ({} pending, {} carried over for retry)",
            self.units.len(),
            pending.len(),
            carried.len()
        );

        carried.extend(self.run_pass(Pass::Main, pending).await);
        carried.sort_unstable();

        let (timeouts, mut sweep): (Vec<usize>, Vec<usize>) = carried
            .into_iter()
            .partition(|&i| self.units[i].status == UnitStatus::Timeout);

        if !timeouts.is_empty() {
            self.pause_between_rounds().await;
            sweep.extend(self.run_pass(Pass::TimeoutRequeue, timeouts).await);
            sweep.sort_unstable();
        }

        for round in 1..=self.config.retries.sweep_rounds {
            if sweep.is_empty() {
                break;
            }
            self.pause_between_rounds().await;
            sweep = self.run_pass(Pass::Sweep { round }, sweep).await;
            self.report.sweep_rounds_run = round;
        }
        if !sweep.is_empty() {
            tracing::warn!("{} units still need attention after the sweep", sweep.len());
        }

        self.finish()
    }

    /// Attempts each unit once, checkpointing after every unit, and returns
    /// the units that carry forward to a later pass.
    pub async fn run_pass(&mut self, pass: Pass, indices: Vec<usize>) -> Vec<usize> {
        if indices.is_empty() {
            return indices;
        }
        tracing::info!("Starting {} over {} units", pass.label(), indices.len());

        let total = indices.len();
        let mut forward = Vec::new();
        for (pos, idx) in indices.into_iter().enumerate() {
            if pos > 0 {
                tokio::time::sleep(ms(self.config.delays.between_units_ms)).await;
            }
            let key = {
                let u = &self.units[idx];
                UnitKey {
                    auction_id: u.auction_id.clone(),
                    title: u.title.clone(),
                    slug: u.slug.clone(),
                    expected: u.expected,
                }
            };
            tracing::info!(
                "[{} {}/{}] {} ({})",
                pass.label(),
                pos + 1,
                total,
                key.title,
                key.auction_id
            );

            let outcome = self.attempt(&key).await;
            self.apply(idx, outcome);
            self.checkpoint();

            let unit = &self.units[idx];
            tracing::info!("{} ({}): {}", unit.title, unit.auction_id, unit.summary);
            if pass.carries_forward(unit.status) {
                forward.push(idx);
            }
        }
        forward
    }

    async fn attempt(&mut self, key: &UnitKey) -> AttemptOutcome {
        if key.slug.trim().is_empty() {
            tracing::warn!("{} ({}) has no slug, skipping", key.title, key.auction_id);
            return AttemptOutcome::failed(key.expected, AttemptFailure::MissingSlug);
        }

        let url = auction_url(&self.config.site.base_url, &key.slug);
        let script = auction_page_script(&url, &self.config);
        let markup = match self.renderer.render(&key.auction_id, &script).await {
            Ok(markup) => markup,
            Err(failure) => return AttemptOutcome::failed(key.expected, failure.into()),
        };

        let records = extract_records(&markup);
        let loaded = records.len();
        let (mut kept, excluded) = self.filter.apply(records);
        tracing::info!(
            "{}: {} vehicles loaded, {} match the filter",
            key.auction_id,
            loaded,
            kept.len()
        );

        for (i, vehicle) in kept.iter_mut().enumerate() {
            if i > 0 {
                tokio::time::sleep(ms(self.config.delays.between_vehicles_ms)).await;
            }
            vehicle.images = self.collect_images(vehicle).await;
            if !vehicle.images.is_empty() {
                self.export_vehicle(key, vehicle).await;
            }
        }

        let counts = UnitCounts::from_records(key.expected, loaded, &kept);
        let status = classify(true, &counts);
        let failure = (status == UnitStatus::Timeout).then_some(AttemptFailure::ExtractionEmpty {
            expected: key.expected,
        });
        AttemptOutcome {
            status,
            counts,
            vehicles: kept,
            excluded,
            failure,
        }
    }

    /// Gallery URLs for one vehicle, retrying the detail page when it yields
    /// none. A failed render counts as zero images.
    async fn collect_images(&self, vehicle: &VehicleRecord) -> Vec<String> {
        let Some(link) = vehicle.vehicle_link.as_deref() else {
            tracing::warn!("{} / {}: no detail link, no images", vehicle.vid, vehicle.item_id);
            return Vec::new();
        };
        let url = vehicle_url(&self.config.site.base_url, link);
        let script = vehicle_page_script(&url, &self.config);
        let attempts = self.config.retries.image_attempts.max(1);

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(ms(self.config.delays.image_retry_ms)).await;
            }
            match self.renderer.render(&vehicle.vid, &script).await {
                Ok(markup) => {
                    let urls = extract_image_urls(&markup, &self.config.site.asset_prefix);
                    if !urls.is_empty() {
                        tracing::debug!("{}: {} images", vehicle.vid, urls.len());
                        return urls;
                    }
                }
                Err(e) => tracing::debug!("{}: detail page failed: {}", vehicle.vid, e),
            }
            tracing::warn!(
                "{}: no images found (attempt {}/{})",
                vehicle.vid,
                attempt,
                attempts
            );
        }
        Vec::new()
    }

    async fn export_vehicle(&mut self, key: &UnitKey, vehicle: &VehicleRecord) {
        let Some(export) = &self.export else {
            return;
        };
        let Some(reg) = vehicle
            .registration_number
            .as_deref()
            .filter(|r| !r.trim().is_empty())
        else {
            tracing::warn!("{} / {}: no registration, not exported", vehicle.vid, vehicle.item_id);
            return;
        };

        let dir_key = sanitize_registration(reg);
        let (vid, item_id) = vehicle.identity();
        let identity = (vid.to_string(), item_id.to_string());
        match self.seen.get(&dir_key) {
            Some(owner) if *owner != identity => {
                tracing::warn!(
                    "duplicate registration {} in auction {} ({} / {}), skipped",
                    dir_key,
                    key.auction_id,
                    vehicle.vid,
                    vehicle.item_id
                );
                return;
            }
            Some(_) => {}
            None => {
                self.seen.insert(dir_key, identity);
            }
        }

        let selected = select_images(&vehicle.images, self.config.images.max_per_vehicle);
        let plan = plan_vehicle_download(&export.root, reg, &selected);
        let result = export.downloader.download_all(plan.jobs).await;
        if let Err(e) =
            write_metadata(&plan.dir, &key.auction_id, &key.title, vehicle, result.present()).await
        {
            tracing::warn!("{}: metadata not written: {}", reg, e);
        }
        self.record_downloads(result);
    }

    fn record_downloads(&mut self, result: DownloadReport) {
        self.report.images_downloaded += result.downloaded;
        self.report.images_skipped += result.skipped;
        self.report.images_failed += result.failed;
    }

    /// Overwrites the unit with the latest attempt's result.
    fn apply(&mut self, idx: usize, outcome: AttemptOutcome) {
        let unit = &mut self.units[idx];
        unit.status = outcome.status;
        unit.summary = summary(outcome.status, &outcome.counts);
        unit.filtered_count = outcome.counts.filtered;
        unit.vehicles = outcome.vehicles;
        unit.error = outcome.failure.map(|f| f.to_string());
        unit.attempts += 1;
        unit.updated_at = Some(Utc::now());
        self.excluded.insert(idx, outcome.excluded);
    }

    fn checkpoint(&mut self) {
        if let Err(e) = self.store.save(&self.units) {
            tracing::error!("checkpoint write failed: {}", e);
            self.report.persistence_failures += 1;
        }
    }

    fn finish(&mut self) -> RunReport {
        let failed: Vec<FailedUnit> = self
            .units
            .iter()
            .filter(|u| matches!(u.status, UnitStatus::Failed | UnitStatus::Timeout))
            .map(FailedUnit::from)
            .collect();
        if let Err(e) = self.store.save_failed(&failed) {
            tracing::error!("failed-unit list write failed: {}", e);
            self.report.persistence_failures += 1;
        }

        let mut report = std::mem::take(&mut self.report);
        report.statuses = StatusTally::from_units(&self.units);
        report.vehicles_kept = self.units.iter().map(|u| u.vehicles.len()).sum();
        report.records_excluded = self.excluded.values().sum();
        report.unresolved = self
            .units
            .iter()
            .filter(|u| {
                matches!(
                    u.status,
                    UnitStatus::Failed | UnitStatus::Partial | UnitStatus::Timeout
                )
            })
            .map(FailedUnit::from)
            .collect();

        let s = &report.statuses;
        tracing::info!(
            "Run finished: {} complete, {} partial, {} no_match, {} timeout, {} failed; {} images downloaded",
            s.complete,
            s.partial,
            s.no_match,
            s.timeout,
            s.failed,
            report.images_downloaded
        );
        report
    }

    fn indices(&self, pred: impl Fn(UnitStatus) -> bool) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| pred(u.status))
            .map(|(i, _)| i)
            .collect()
    }

    async fn pause_between_rounds(&self) {
        tokio::time::sleep(ms(self.config.delays.between_rounds_ms)).await;
    }
}
