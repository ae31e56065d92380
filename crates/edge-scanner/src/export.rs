//! Report writers. Every run produces a run-metadata JSON; CSV, JSON, and
//! Markdown reports are written on demand, all ranked by score.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use edge_core::types::{MarketSignal, RunMetadata, WalletScore};
use serde_json::json;

/// Base name for this run's report files: slug (or condition id) plus the
/// run timestamp.
pub fn file_stem(metadata: &RunMetadata) -> String {
    let base = metadata
        .market_slug
        .as_deref()
        .unwrap_or(&metadata.condition_id);
    format!(
        "{}-{}",
        base,
        metadata.run_timestamp.format("%Y%m%d-%H%M%S")
    )
}

pub fn write_csv(path: &Path, scores: &[WalletScore]) -> Result<()> {
    fs::write(path, csv_report(scores))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_json(
    path: &Path,
    metadata: &RunMetadata,
    signal: &MarketSignal,
    scores: &[WalletScore],
) -> Result<()> {
    let payload = json!({
        "metadata": metadata,
        "market_signal": signal,
        "wallets": ranked(scores),
    });
    fs::write(path, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_markdown(
    path: &Path,
    metadata: &RunMetadata,
    signal: &MarketSignal,
    scores: &[WalletScore],
) -> Result<()> {
    fs::write(path, markdown_report(metadata, signal, scores))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_run_metadata(path: &Path, metadata: &RunMetadata) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(metadata)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Scores ordered best-first. NaN never occurs in practice; ties keep input
/// order.
fn ranked(scores: &[WalletScore]) -> Vec<&WalletScore> {
    let mut ordered: Vec<&WalletScore> = scores.iter().collect();
    ordered.sort_by(|a, b| {
        b.insider_likelihood_score
            .partial_cmp(&a.insider_likelihood_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ordered
}

fn csv_report(scores: &[WalletScore]) -> String {
    let mut out = String::from(
        "address,username,current_stake_usd,current_side,insider_likelihood_score,\
         win_rate,pnl_per_usd,timing_edge,conviction_z,consistency,\
         signed_contribution,sample_size,low_sample_flag\n",
    );
    for s in ranked(scores) {
        out.push_str(&format!(
            "{},{},{:.2},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.2},{},{}\n",
            s.address,
            csv_escape(s.username.as_deref().unwrap_or("")),
            s.current_stake_usd,
            s.current_side,
            s.insider_likelihood_score,
            s.features.win_rate,
            s.features.pnl_per_usd,
            s.features.timing_edge,
            s.features.conviction_z,
            s.features.consistency,
            s.signed_contribution,
            s.sample_size,
            s.low_sample_flag,
        ));
    }
    out
}

/// Quotes a field when it contains CSV-significant characters.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn markdown_report(
    metadata: &RunMetadata,
    signal: &MarketSignal,
    scores: &[WalletScore],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Edge report: {}\n\n", metadata.market_title));
    out.push_str(&format!(
        "Run at {} UTC\n\n",
        metadata.run_timestamp.format("%Y-%m-%d %H:%M:%S")
    ));

    out.push_str("## Signal\n\n");
    out.push_str(&format!("- Direction: **{}**\n", signal.direction));
    out.push_str(&format!("- Final score: {:.4}\n", signal.final_score));
    out.push_str(&format!("- Holder signal: {:.4}\n", signal.holder_signal));
    match signal.dir_score {
        Some(d) => out.push_str(&format!("- Price direction: {d:.4}\n")),
        None => out.push_str("- Price direction: not used\n"),
    }
    out.push_str(&format!(
        "- Wallets scored: {} of {} holders ({} low-sample)\n",
        metadata.holders_scored, metadata.holders_analyzed, metadata.holders_low_sample
    ));
    out.push_str(&format!(
        "- Total stake: ${:.2}\n\n",
        signal.total_stake_usd
    ));

    out.push_str("## Top wallets\n\n");
    out.push_str("| Wallet | Side | Stake (USD) | Score | Win rate | Sample |\n");
    out.push_str("|---|---|---:|---:|---:|---:|\n");
    for s in ranked(scores).iter().take(20) {
        out.push_str(&format!(
            "| {} | {} | {:.2} | {:.4} | {:.4} | {}{} |\n",
            short_address(&s.address),
            s.current_side,
            s.current_stake_usd,
            s.insider_likelihood_score,
            s.features.win_rate,
            s.sample_size,
            if s.low_sample_flag { "*" } else { "" },
        ));
    }
    out.push('\n');
    out.push_str("\\* fewer resolved markets than the configured minimum sample\n\n");

    out.push_str("## Notes\n\n");
    out.push_str(
        "Scores summarize how a wallet has historically performed in \
         earnings-style markets. A high score is a behavioral pattern, not \
         evidence of insider knowledge. Thin histories shrink toward the \
         neutral prior and are flagged in the Sample column.\n\n",
    );

    out.push_str("## Glossary\n\n");
    out.push_str(
        "- **Score**: weighted blend of the wallet's five behavioral \
         features, in [0, 1]; 0.5 is neutral.\n\
         - **Holder signal**: stake-weighted sum of signed wallet \
         contributions, each capped, in [-1, 1].\n\
         - **Price direction**: order book mid mapped to [-1, 1], blended \
         into the final score when available.\n\
         - **Sample**: resolved earnings-style markets backing the score; \
         small samples sit close to neutral.\n",
    );
    out
}

/// `0x1234…abcd` display form for wallet addresses. Counts characters, not
/// bytes: the API occasionally hands back display names in the address
/// field, and those are not guaranteed ASCII.
fn short_address(address: &str) -> String {
    let count = address.chars().count();
    if count <= 12 {
        return address.to_string();
    }
    let head: String = address.chars().take(6).collect();
    let tail: String = address.chars().skip(count - 4).collect();
    format!("{head}…{tail}")
}
