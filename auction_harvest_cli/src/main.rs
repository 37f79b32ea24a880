mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "auction-harvest")]
#[command(about = "Harvest vehicle listings and images from auction pages")]
struct Cli {
    /// Output format: table or json
    #[arg(long, default_value = "table", global = true)]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every auction in a feed and checkpoint the results
    Run(Box<commands::run::RunArgs>),
    /// Summarize an existing checkpoint
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("auction_harvest=info,auction_harvest_cli=info")
            }),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };

    match &cli.command {
        Commands::Run(args) => commands::run::run(args.as_ref(), &format).await?,
        Commands::Status(args) => commands::status::run(args, &format)?,
    }

    Ok(())
}
