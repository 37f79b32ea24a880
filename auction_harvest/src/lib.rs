//! Harvesting pipeline for the vehicle auction SPA.
//!
//! Renders auction pages in a headless browser, extracts vehicle records,
//! keeps the ones that pass the region/RC filter, collects gallery images and
//! checkpoints every auction after it is processed. Failed, timed-out and
//! partial auctions are retried in bounded recovery rounds.

pub mod checkpoint;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod filter;
pub mod harvest;
pub mod model;
pub mod render;

pub use auction_feed;

pub use checkpoint::{CheckpointStore, PersistenceError};
pub use config::HarvestConfig;
pub use download::{DownloadError, DownloadReport, ImageDownloader};
pub use error::{AttemptFailure, HarvestError};
pub use filter::{classify, RecordFilter, UnitCounts};
pub use harvest::{merge_resumed, Harvester, Pass};
pub use model::{AuctionUnit, FailedUnit, RunReport, StatusTally, UnitStatus, VehicleRecord};
pub use render::{
    BrowserDriver, BrowserSession, ChromiumDriver, DriverError, RenderFailure, Renderer,
};
