//! Earnings Logger
//!
//! Looks up the Polymarket beat/miss market for an earnings event and
//! prints a JSON label with its resolution state and UTC close time.

mod labels;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use edge_core::api::GammaClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "earnings-logger")]
#[command(version, about = "Log resolution labels for earnings beat/miss markets")]
struct Cli {
    /// Search query for the earnings market, e.g. "NVDA earnings"
    #[arg(short, long)]
    query: String,

    /// Earnings close time in US/Eastern, as "YYYY-MM-DD HH:MM"
    #[arg(long, value_name = "DATETIME")]
    close_et: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "earnings_logger=info,edge_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let close_et = NaiveDateTime::parse_from_str(&cli.close_et, "%Y-%m-%d %H:%M")
        .context("close time must look like \"2025-08-27 16:00\"")?;

    info!(query = %cli.query, "Looking up earnings market");
    let gamma = GammaClient::new(None);
    let label = labels::build_label(&gamma, &cli.query, close_et).await?;

    println!("{}", serde_json::to_string(&label)?);
    Ok(())
}
