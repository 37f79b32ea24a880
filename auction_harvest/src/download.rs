//! Bounded-concurrency image downloads and per-vehicle export layout.
//!
//! Layout under the images root:
//!
//! ```text
//! <REG>/images/1.jpg
//! <REG>/images/2.jpg
//! <REG>/metadata.txt
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::StatusCode;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::config::ImageConfig;
use crate::error::HarvestError;
use crate::model::VehicleRecord;

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    HttpStatus { url: String, status: StatusCode },
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("download pool closed")]
    PoolClosed,
}

/// One URL and the file it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DownloadReport {
    /// Files present on disk after the batch.
    pub fn present(&self) -> usize {
        self.downloaded + self.skipped
    }
}

/// All of `urls` when there are at most `max`, otherwise exactly `max`
/// distinct ones chosen uniformly at random.
pub fn select_images(urls: &[String], max: usize) -> Vec<String> {
    if urls.len() <= max {
        return urls.to_vec();
    }
    urls.choose_multiple(&mut rand::thread_rng(), max)
        .cloned()
        .collect()
}

/// Registration number as a directory name: upper case, every
/// non-alphanumeric character replaced by `_`.
pub fn sanitize_registration(reg: &str) -> String {
    reg.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// File extension of the URL path including the dot, `.jpg` when absent.
pub fn image_extension(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => ".jpg".to_string(),
    }
}

/// Where one vehicle's export lives and which files it downloads.
#[derive(Debug, Clone)]
pub struct VehicleExport {
    pub dir: PathBuf,
    pub jobs: Vec<DownloadJob>,
}

/// Numbers the selected images `1..` in selection order.
pub fn plan_vehicle_download(
    root: &Path,
    registration: &str,
    selected: &[String],
) -> VehicleExport {
    let dir = root.join(sanitize_registration(registration));
    let images = dir.join("images");
    let jobs = selected
        .iter()
        .enumerate()
        .map(|(i, url)| DownloadJob {
            url: url.clone(),
            dest: images.join(format!("{}{}", i + 1, image_extension(url))),
        })
        .collect();
    VehicleExport { dir, jobs }
}

/// Writes `metadata.txt` for a vehicle into `dir`.
pub async fn write_metadata(
    dir: &Path,
    auction_id: &str,
    auction_title: &str,
    vehicle: &VehicleRecord,
    image_count: usize,
) -> Result<(), DownloadError> {
    let field = |v: &Option<String>| v.clone().unwrap_or_default();
    let lines = [
        ("Auction ID", auction_id.to_string()),
        ("Auction Title", auction_title.to_string()),
        ("VID", vehicle.vid.clone()),
        ("Item ID", vehicle.item_id.clone()),
        ("Make/Model", field(&vehicle.make_model)),
        ("Registration Number", field(&vehicle.registration_number)),
        ("Mfg Year", field(&vehicle.manufacturing_year)),
        ("Location", field(&vehicle.location)),
        ("Paper Status", field(&vehicle.paper_status)),
        ("RC Status", field(&vehicle.rc_status)),
        ("Transmission", field(&vehicle.transmission)),
        ("Ownership", field(&vehicle.ownership)),
        ("Fuel Type", field(&vehicle.fuel_type)),
        ("Yard Name", field(&vehicle.yard_name)),
        ("Yard Location", field(&vehicle.yard_location)),
        ("Image Count", image_count.to_string()),
    ];
    let mut body = String::new();
    for (key, value) in lines {
        body.push_str(key);
        body.push_str(": ");
        body.push_str(&value);
        body.push('\n');
    }

    let path = dir.join("metadata.txt");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| io_error(dir, source))?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|source| io_error(&path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.display().to_string(),
        source,
    }
}

pub struct ImageDownloader {
    http: reqwest::Client,
    workers: usize,
}

impl ImageDownloader {
    pub fn new(cfg: &ImageConfig, user_agent: &str) -> Result<Self, HarvestError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.download_timeout_ms))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            http,
            workers: cfg.workers.max(1),
        })
    }

    /// Fetches every job whose destination does not exist yet. Failures are
    /// logged and counted; they never cancel the rest of the batch.
    pub async fn download_all(&self, jobs: Vec<DownloadJob>) -> DownloadReport {
        let mut report = DownloadReport::default();
        let mut pending = Vec::with_capacity(jobs.len());
        for job in jobs {
            if tokio::fs::try_exists(&job.dest).await.unwrap_or(false) {
                report.skipped += 1;
            } else {
                pending.push(job);
            }
        }
        if pending.is_empty() {
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::channel::<(String, Result<(), DownloadError>)>(self.workers * 2);
        let mut join_set = JoinSet::new();
        let spawned = pending.len();

        for job in pending {
            let sem = Arc::clone(&semaphore);
            let sender = tx.clone();
            let http = self.http.clone();
            join_set.spawn(async move {
                let result = match sem.acquire().await {
                    Ok(_permit) => fetch_to_file(&http, &job).await,
                    Err(_) => Err(DownloadError::PoolClosed),
                };
                let _ = sender.send((job.url, result)).await;
            });
        }
        drop(tx);

        let mut received = 0usize;
        while let Some((url, result)) = rx.recv().await {
            received += 1;
            match result {
                Ok(()) => report.downloaded += 1,
                Err(e) => {
                    tracing::warn!("image download failed for {}: {}", url, e);
                    report.failed += 1;
                }
            }
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("image download task aborted: {}", e);
            }
        }
        report.failed += spawned - received;
        report
    }
}

async fn fetch_to_file(http: &reqwest::Client, job: &DownloadJob) -> Result<(), DownloadError> {
    let resp = http.get(&job.url).send().await?;
    if !resp.status().is_success() {
        return Err(DownloadError::HttpStatus {
            url: job.url.clone(),
            status: resp.status(),
        });
    }
    let bytes = resp.bytes().await?;

    if let Some(parent) = job.dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| io_error(parent, source))?;
    }
    // Only a complete body ever lands on `dest`, so skip-if-exists is safe.
    let part = part_path(&job.dest);
    tokio::fs::write(&part, &bytes)
        .await
        .map_err(|source| io_error(&part, source))?;
    tokio::fs::rename(&part, &job.dest)
        .await
        .map_err(|source| io_error(&job.dest, source))?;
    tracing::debug!("saved {}", job.dest.display());
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}
