//! Edge Scanner
//!
//! Scores the current holders of a Polymarket market on their historical
//! performance in earnings-style markets, then aggregates the per-wallet
//! scores into a single market direction signal.

mod export;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "edge-scanner")]
#[command(version, about = "Score market holders on historical earnings-market edge")]
pub struct Cli {
    /// Market to scan: a polymarket.com URL, a slug, or a condition id
    #[arg(short, long)]
    pub market: String,

    /// Directory for report files
    #[arg(short, long, default_value = "./output")]
    pub outdir: PathBuf,

    /// Config file path; defaults plus EDGE_* env vars apply without one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the history lookback, in quarters
    #[arg(long)]
    pub since_quarters: Option<u32>,

    /// Override the minimum resolved sample before a score is fully trusted
    #[arg(long)]
    pub min_sample: Option<usize>,

    /// Skip the order book and score holders alone
    #[arg(long)]
    pub no_price_signal: bool,

    /// Also narrow history fetches to earnings markets server-side
    #[arg(long)]
    pub earnings_only: bool,

    /// Write the CSV report (all formats are written when no --save-* flag is set)
    #[arg(long)]
    pub save_csv: bool,

    /// Write the JSON report
    #[arg(long)]
    pub save_json: bool,

    /// Write the Markdown report
    #[arg(long)]
    pub save_md: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "edge_scanner=debug,edge_core=debug"
    } else {
        "edge_scanner=info,edge_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    run::run(cli).await
}
