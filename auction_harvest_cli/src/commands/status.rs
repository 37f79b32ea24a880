//! The `status` subcommand: summarize a checkpoint without touching it.

use std::path::PathBuf;

use anyhow::{bail, Result};
use auction_harvest::{CheckpointStore, UnitStatus};
use clap::Args;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct StatusArgs {
    /// Checkpoint file to read
    #[arg(long, default_value = "auction_details.json")]
    pub checkpoint: PathBuf,

    /// Only list units with this status (pending, complete, partial, no_match, timeout, failed)
    #[arg(long)]
    pub only: Option<String>,
}

pub fn run(args: &StatusArgs, format: &OutputFormat) -> Result<()> {
    let store = CheckpointStore::new(&args.checkpoint);
    let Some(mut units) = store.load()? else {
        bail!("no checkpoint at {}", args.checkpoint.display());
    };

    if let Some(ref only) = args.only {
        let wanted = parse_status(only)?;
        units.retain(|u| u.status == wanted);
    }

    match format {
        OutputFormat::Table => output::print_units_table(&units),
        OutputFormat::Json => output::print_json(&units),
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<UnitStatus> {
    let quoted = serde_json::Value::String(raw.trim().to_lowercase());
    match serde_json::from_value(quoted) {
        Ok(status) => Ok(status),
        Err(_) => bail!("unknown status: {}", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!(parse_status("no_match").unwrap(), UnitStatus::NoMatch);
        assert_eq!(parse_status(" Partial ").unwrap(), UnitStatus::Partial);
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(parse_status("done").is_err());
    }

    #[test]
    fn missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = StatusArgs {
            checkpoint: dir.path().join("absent.json"),
            only: None,
        };
        assert!(run(&args, &OutputFormat::Json).is_err());
    }
}
