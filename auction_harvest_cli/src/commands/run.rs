//! The `run` subcommand: harvest every auction in a feed file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use auction_harvest::auction_feed::{load_descriptors, SessionContext};
use auction_harvest::{
    merge_resumed, CheckpointStore, ChromiumDriver, HarvestConfig, Harvester, ImageDownloader,
};
use clap::Args;

use crate::output::{self, OutputFormat};

/// Arguments for the `run` subcommand.
#[derive(Args)]
pub struct RunArgs {
    /// Auction feed produced by the discovery stage (JSON array)
    #[arg(long)]
    pub feed: PathBuf,

    /// Checkpoint file, rewritten after every auction
    #[arg(long, default_value = "auction_details.json")]
    pub checkpoint: PathBuf,

    /// Failed-unit list (defaults to <checkpoint>_failed.json)
    #[arg(long)]
    pub failed_out: Option<PathBuf>,

    /// Root directory for per-vehicle image folders
    #[arg(long, default_value = "vehicles")]
    pub images_dir: PathBuf,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Continue from the existing checkpoint instead of starting over
    #[arg(long)]
    pub resume: bool,

    /// Collect image URLs without downloading them
    #[arg(long)]
    pub no_download: bool,

    /// Registration prefix a vehicle must carry (e.g. GJ)
    #[arg(long)]
    pub region_prefix: Option<String>,

    /// Phrase the RC status must contain
    #[arg(long)]
    pub rc_phrase: Option<String>,

    /// Images downloaded per vehicle
    #[arg(long)]
    pub max_images: Option<usize>,

    /// Concurrent image downloads per vehicle
    #[arg(long)]
    pub workers: Option<usize>,

    /// Recovery sweep rounds after the main pass
    #[arg(long)]
    pub sweep_rounds: Option<u32>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Environment variable holding the session cookie
    #[arg(long, default_value = "CAR_DEKHO_COOKIE")]
    pub cookie_env: String,
}

pub async fn run(args: &RunArgs, format: &OutputFormat) -> Result<()> {
    let config = build_config(args)?;

    let descriptors = load_descriptors(&args.feed)
        .with_context(|| format!("loading feed {}", args.feed.display()))?;

    let mut store = CheckpointStore::new(&args.checkpoint);
    if let Some(ref failed_out) = args.failed_out {
        store = store.with_failed_path(failed_out);
    }

    let resumed = if args.resume {
        let loaded = store.load()?;
        match &loaded {
            Some(units) => eprintln!(
                "Resuming from {} ({} units)",
                args.checkpoint.display(),
                units.len()
            ),
            None => eprintln!(
                "No checkpoint at {}, starting fresh",
                args.checkpoint.display()
            ),
        }
        loaded
    } else {
        if args.checkpoint.exists() {
            tracing::warn!(
                "{} exists and will be overwritten (pass --resume to continue it)",
                args.checkpoint.display()
            );
        }
        None
    };
    let units = merge_resumed(descriptors, resumed);
    eprintln!("Starting harvest of {} auctions", units.len());

    let cookie = std::env::var(&args.cookie_env).unwrap_or_default();
    let session = SessionContext::new(cookie);
    if !session.is_authenticated() {
        tracing::warn!("{} is not set, pages load without a session", args.cookie_env);
    }
    let user_agent = session.user_agent().to_string();
    let driver = ChromiumDriver::new(session, &config.site, &config.timeouts)?;

    let downloader = if config.images.download {
        Some(ImageDownloader::new(&config.images, &user_agent)?)
    } else {
        eprintln!("Image downloads disabled, collecting URLs only");
        None
    };
    let mut harvester = Harvester::new(units, driver, config, store);
    if let Some(downloader) = downloader {
        harvester = harvester.with_image_export(downloader, &args.images_dir);
    }

    let report = harvester.run().await;

    match format {
        OutputFormat::Table => output::print_report_table(&report),
        OutputFormat::Json => output::print_json(&report),
    }
    Ok(())
}

/// Config file and environment first, then command-line flags.
fn build_config(args: &RunArgs) -> Result<HarvestConfig> {
    let mut config = HarvestConfig::load(args.config.as_deref())?;
    if let Some(ref prefix) = args.region_prefix {
        config.filter.region_prefix = prefix.clone();
    }
    if let Some(ref phrase) = args.rc_phrase {
        config.filter.rc_phrase = phrase.clone();
    }
    if let Some(n) = args.max_images {
        config.images.max_per_vehicle = n;
    }
    if let Some(n) = args.workers {
        config.images.workers = n;
    }
    if let Some(n) = args.sweep_rounds {
        config.retries.sweep_rounds = n;
    }
    if args.no_download {
        config.images.download = false;
    }
    if args.headful {
        config.site.headless = false;
    }
    config.validate()?;
    Ok(config)
}
