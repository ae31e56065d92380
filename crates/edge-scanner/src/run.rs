//! Scan pipeline: resolve the market, fetch holders and their histories,
//! score each wallet, aggregate the signal, and write reports.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use edge_core::api::{ClobClient, DataApiClient, GammaClient};
use edge_core::config::Config;
use edge_core::features::compute_features;
use edge_core::scoring::{aggregate_market_signal, compute_wallet_scores, WalletObservation};
use edge_core::types::{ClosedPosition, Holder, Market, RunMetadata, Trade};
use futures_util::{stream, StreamExt};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::export;
use crate::Cli;

/// Concurrent per-wallet history fetches.
const FETCH_CONCURRENCY: usize = 8;
/// Holders pulled per market.
const HOLDER_LIMIT: usize = 100;
/// History records pulled per wallet and endpoint.
const HISTORY_LIMIT: usize = 500;

pub async fn run(cli: Cli) -> Result<()> {
    let mut cfg = Config::load(cli.config.as_deref()).context("loading configuration")?;
    apply_overrides(&mut cfg, &cli);
    cfg.validate().context("validating configuration")?;
    let earnings_pattern = cfg.history.title_pattern()?;

    let gamma = GammaClient::new(None);
    let data_api = DataApiClient::new(None);

    info!(market = %cli.market, "Resolving market");
    let market = gamma.resolve_market(&cli.market).await?;
    info!(
        condition_id = %market.condition_id,
        question = %market.question,
        "Scanning market"
    );

    let holders = data_api.holders(&market.condition_id, HOLDER_LIMIT).await?;
    if holders.is_empty() {
        bail!("market {} has no holders to score", market.condition_id);
    }
    let holders = dedup_holders(holders);
    let holders_analyzed = holders.len();
    info!(holders = holders_analyzed, "Fetched current holders");

    let dir_score = if cfg.market_signal.use_dir_from_price {
        fetch_direction_score(&market).await
    } else {
        None
    };

    let title_filter = cli.earnings_only.then_some("earnings");
    let cutoff = Utc::now() - Duration::days(90 * i64::from(cfg.history.lookback_quarters));

    let observations: Vec<WalletObservation> = stream::iter(holders)
        .map(|holder| {
            let data_api = &data_api;
            let cfg = &cfg;
            let earnings_pattern = &earnings_pattern;
            async move {
                match fetch_history(data_api, &holder.address, title_filter).await {
                    Ok((positions, trades)) => {
                        build_observation(holder, positions, trades, cutoff, earnings_pattern, cfg)
                    }
                    Err(e) => {
                        warn!(
                            wallet = %holder.address,
                            error = %e,
                            "History fetch failed, skipping wallet"
                        );
                        None
                    }
                }
            }
        })
        .buffer_unordered(FETCH_CONCURRENCY)
        .collect::<Vec<Option<WalletObservation>>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    info!(
        scored = observations.len(),
        skipped = holders_analyzed - observations.len(),
        "Built wallet observations"
    );

    let scores = compute_wallet_scores(&observations, &cfg)?;
    let signal = aggregate_market_signal(&scores, dir_score, &cfg);

    info!(
        holder_signal = signal.holder_signal,
        final_score = signal.final_score,
        direction = %signal.direction,
        wallets = signal.wallet_count,
        "Market signal"
    );

    let metadata = RunMetadata {
        market_slug: market.slug.clone(),
        condition_id: market.condition_id.clone(),
        market_title: market.question.clone(),
        run_timestamp: Utc::now(),
        holders_analyzed,
        holders_scored: scores.len(),
        holders_low_sample: scores.iter().filter(|s| s.low_sample_flag).count(),
        config: cfg,
    };

    std::fs::create_dir_all(&cli.outdir)
        .with_context(|| format!("creating output directory {}", cli.outdir.display()))?;
    let stem = export::file_stem(&metadata);
    let write_all = !(cli.save_csv || cli.save_json || cli.save_md);

    if write_all || cli.save_csv {
        let path = cli.outdir.join(format!("{stem}.csv"));
        export::write_csv(&path, &scores)?;
        info!(path = %path.display(), "Wrote CSV report");
    }
    if write_all || cli.save_json {
        let path = cli.outdir.join(format!("{stem}.json"));
        export::write_json(&path, &metadata, &signal, &scores)?;
        info!(path = %path.display(), "Wrote JSON report");
    }
    if write_all || cli.save_md {
        let path = cli.outdir.join(format!("{stem}.md"));
        export::write_markdown(&path, &metadata, &signal, &scores)?;
        info!(path = %path.display(), "Wrote Markdown report");
    }
    let meta_path = cli.outdir.join(format!("{stem}.run.json"));
    export::write_run_metadata(&meta_path, &metadata)?;
    info!(path = %meta_path.display(), "Wrote run metadata");

    Ok(())
}

fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(quarters) = cli.since_quarters {
        cfg.history.lookback_quarters = quarters;
    }
    if let Some(min_sample) = cli.min_sample {
        cfg.history.min_sample = min_sample;
    }
    if cli.no_price_signal {
        cfg.market_signal.use_dir_from_price = false;
    }
}

/// Order book direction for the YES token, or `None` when the book is
/// unavailable; scanning proceeds on holder evidence alone in that case.
async fn fetch_direction_score(market: &Market) -> Option<f64> {
    let token_id = match &market.yes_token_id {
        Some(id) => id,
        None => {
            warn!("Market has no YES token id, skipping price direction");
            return None;
        }
    };
    let clob = ClobClient::new(None);
    match clob.order_book(token_id).await {
        Ok(book) => {
            let score = book.direction_score();
            if score.is_none() {
                warn!("Order book is missing a side, skipping price direction");
            }
            score
        }
        Err(e) => {
            warn!(error = %e, "Order book fetch failed, continuing without price direction");
            None
        }
    }
}

async fn fetch_history(
    data_api: &DataApiClient,
    address: &str,
    title_filter: Option<&str>,
) -> edge_core::Result<(Vec<ClosedPosition>, Vec<Trade>)> {
    let positions = data_api
        .closed_positions(address, title_filter, HISTORY_LIMIT)
        .await?;
    let trades = data_api.trades(None, Some(address), HISTORY_LIMIT).await?;
    Ok((positions, trades))
}

/// The holders endpoint can list a wallet once per outcome token it holds;
/// keep the record with the larger stake.
fn dedup_holders(holders: Vec<Holder>) -> Vec<Holder> {
    let mut deduped: Vec<Holder> = Vec::with_capacity(holders.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for holder in holders {
        match index.get(&holder.address) {
            Some(&i) if deduped[i].amount_usd >= holder.amount_usd => {}
            Some(&i) => deduped[i] = holder,
            None => {
                index.insert(holder.address.clone(), deduped.len());
                deduped.push(holder);
            }
        }
    }
    deduped
}

/// Drops positions that resolved before the lookback cutoff; positions
/// without a resolution time are kept.
fn filter_lookback(positions: Vec<ClosedPosition>, cutoff: DateTime<Utc>) -> Vec<ClosedPosition> {
    positions
        .into_iter()
        .filter(|p| p.resolved_at.map_or(true, |at| at >= cutoff))
        .collect()
}

/// Turns one holder plus their fetched history into a scoring observation.
/// Zero-stake wallets are dropped as noise unless their resolved-position
/// volume and their trade count both clear the configured floors; wallets
/// with live stake are always scored.
fn build_observation(
    holder: Holder,
    positions: Vec<ClosedPosition>,
    trades: Vec<Trade>,
    cutoff: DateTime<Utc>,
    earnings_pattern: &Regex,
    cfg: &Config,
) -> Option<WalletObservation> {
    let positions = filter_lookback(positions, cutoff);
    let activity_usd: f64 = positions.iter().map(|p| p.stake_usd()).sum();
    if holder.amount_usd == 0.0
        && (activity_usd < cfg.filters.ignore_low_activity_usd
            || (trades.len() as u32) < cfg.filters.ignore_total_trades_lt)
    {
        debug!(wallet = %holder.address, "Skipping inactive zero-stake wallet");
        return None;
    }

    let (features, sample_size) =
        compute_features(holder.amount_usd, &positions, &trades, earnings_pattern, cfg);
    let side = holder.side();
    Some(WalletObservation {
        address: holder.address,
        username: holder.username,
        current_stake_usd: holder.amount_usd,
        side,
        features,
        sample_size,
    })
}
