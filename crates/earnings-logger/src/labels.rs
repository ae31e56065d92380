//! Earnings market lookup and label extraction.
//!
//! Resolution fields vary across market generations (`resolved` vs
//! `isResolved`, `outcome` as bool/number/text), so the extraction here
//! works through the same kind of fallback chains the fetch layer uses.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use edge_core::api::{GammaClient, MarketDetails, SearchMarket};
use serde::Serialize;
use tracing::{debug, info};

/// One labeled earnings market, emitted as a JSON line.
#[derive(Debug, Serialize)]
pub struct EarningsLabel {
    pub query: String,
    pub slug: String,
    pub title: String,
    pub resolved: bool,
    /// "YES" when the company beat, "NO" when it missed, absent while open.
    pub outcome_side: Option<String>,
    pub close_time_utc: DateTime<Utc>,
    pub resolution_source: Option<String>,
}

pub async fn build_label(
    gamma: &GammaClient,
    query: &str,
    close_et: NaiveDateTime,
) -> Result<EarningsLabel> {
    let results = gamma.public_search(query).await?;
    info!(hits = results.len(), "Search returned candidates");

    let market = pick_earnings_market(&results, query)
        .ok_or_else(|| anyhow!("no earnings beat/miss market found for {query:?}"))?;
    let slug = market
        .slug
        .clone()
        .ok_or_else(|| anyhow!("matched market has no slug"))?;
    debug!(slug = %slug, "Fetching market details");
    let details = gamma.market_details_by_slug(&slug).await?;

    let (resolved, outcome_side) = resolution_state(&details);
    let title = details
        .title_text()
        .or(market.title_text())
        .unwrap_or("unknown")
        .to_string();

    Ok(EarningsLabel {
        query: query.to_string(),
        slug,
        title,
        resolved,
        outcome_side,
        close_time_utc: eastern_to_utc(close_et)?,
        resolution_source: resolution_source(&details),
    })
}

/// Picks the beat/miss earnings market from search hits, preferring one
/// whose title mentions the leading query token (usually the ticker).
fn pick_earnings_market<'a>(results: &'a [SearchMarket], query: &str) -> Option<&'a SearchMarket> {
    let hint = query
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let reads_like_earnings = |title: &str| {
        title.contains("earnings") && (title.contains("beat") || title.contains("miss"))
    };

    let mut fallback = None;
    for market in results {
        let title = match market.title_text() {
            Some(t) => t.to_lowercase(),
            None => continue,
        };
        if !reads_like_earnings(&title) {
            continue;
        }
        if !hint.is_empty() && title.contains(&hint) {
            return Some(market);
        }
        fallback.get_or_insert(market);
    }
    fallback
}

/// Resolved flag plus the YES/NO side when one can be read off the payload.
fn resolution_state(details: &MarketDetails) -> (bool, Option<String>) {
    let resolved =
        details.resolved.or(details.is_resolved).unwrap_or(false) || details.outcome.is_some();
    let side = if resolved { outcome_side(details) } else { None };
    (resolved, side)
}

fn outcome_side(details: &MarketDetails) -> Option<String> {
    let value = details.outcome.as_ref().or(details.resolution.as_ref())?;
    side_from_value(value)
}

/// Maps the polymorphic `outcome`/`resolution` encodings onto YES/NO.
fn side_from_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Bool(true) => Some("YES".to_string()),
        serde_json::Value::Bool(false) => Some("NO".to_string()),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(1) => Some("YES".to_string()),
            Some(0) => Some("NO".to_string()),
            _ => None,
        },
        serde_json::Value::String(s) => match s.to_lowercase().as_str() {
            "yes" | "true" | "beat" | "1" => Some("YES".to_string()),
            "no" | "false" | "miss" | "0" => Some("NO".to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn resolution_source(details: &MarketDetails) -> Option<String> {
    details
        .resolution_text
        .clone()
        .or_else(|| details.event.as_ref().and_then(|e| e.resolution_text.clone()))
        .or_else(|| details.source_url.clone())
        .or_else(|| details.event.as_ref().and_then(|e| e.source_url.clone()))
        .or_else(|| details.source.clone())
}

/// Converts a naive US/Eastern close time to UTC. Ambiguous or nonexistent
/// local times around DST transitions are rejected rather than guessed.
fn eastern_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    match New_York.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(..) => {
            bail!("{naive} is ambiguous in US/Eastern (DST fall-back)")
        }
        LocalResult::None => {
            bail!("{naive} does not exist in US/Eastern (DST spring-forward)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn search_market(title: &str, slug: &str) -> SearchMarket {
        serde_json::from_value(json!({ "title": title, "slug": slug })).unwrap()
    }

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_pick_prefers_title_with_query_hint() {
        let results = vec![
            search_market("Will TSLA beat Q2 earnings?", "tsla-q2"),
            search_market("Will NVDA beat Q2 earnings?", "nvda-q2"),
        ];
        let market = pick_earnings_market(&results, "nvda earnings").unwrap();
        assert_eq!(market.slug.as_deref(), Some("nvda-q2"));
    }

    #[test]
    fn test_pick_falls_back_to_first_earnings_market() {
        let results = vec![
            search_market("Fed cuts rates in September?", "fed-cut"),
            search_market("Will TSLA miss Q2 earnings?", "tsla-q2"),
        ];
        let market = pick_earnings_market(&results, "zzzz").unwrap();
        assert_eq!(market.slug.as_deref(), Some("tsla-q2"));
    }

    #[test]
    fn test_pick_ignores_non_earnings_markets() {
        let results = vec![search_market("Will it rain in NYC tomorrow?", "nyc-rain")];
        assert!(pick_earnings_market(&results, "nyc").is_none());
    }

    #[test]
    fn test_side_from_value_coercions() {
        assert_eq!(side_from_value(&json!(true)).as_deref(), Some("YES"));
        assert_eq!(side_from_value(&json!(false)).as_deref(), Some("NO"));
        assert_eq!(side_from_value(&json!(1)).as_deref(), Some("YES"));
        assert_eq!(side_from_value(&json!(0)).as_deref(), Some("NO"));
        assert_eq!(side_from_value(&json!("Beat")).as_deref(), Some("YES"));
        assert_eq!(side_from_value(&json!("miss")).as_deref(), Some("NO"));
        assert_eq!(side_from_value(&json!("unclear")), None);
        assert_eq!(side_from_value(&json!([1])), None);
    }

    #[test]
    fn test_resolution_state_reads_outcome_presence() {
        let details: MarketDetails =
            serde_json::from_value(json!({ "outcome": "Yes" })).unwrap();
        assert_eq!(resolution_state(&details), (true, Some("YES".to_string())));

        let open: MarketDetails =
            serde_json::from_value(json!({ "resolved": false })).unwrap();
        assert_eq!(resolution_state(&open), (false, None));
    }

    #[test]
    fn test_resolution_source_chain() {
        let details: MarketDetails = serde_json::from_value(json!({
            "event": { "sourceUrl": "https://ir.example.com/q2" }
        }))
        .unwrap();
        assert_eq!(
            resolution_source(&details).as_deref(),
            Some("https://ir.example.com/q2")
        );

        let with_text: MarketDetails = serde_json::from_value(json!({
            "resolutionText": "Resolved YES per 8-K filing",
            "sourceUrl": "https://example.com"
        }))
        .unwrap();
        assert_eq!(
            resolution_source(&with_text).as_deref(),
            Some("Resolved YES per 8-K filing")
        );
    }

    #[test]
    fn test_eastern_afternoon_converts_to_utc() {
        // EDT is UTC-4 in late August.
        let utc = eastern_to_utc(naive(2025, 8, 27, 16, 0)).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-08-27T20:00:00+00:00");
    }

    #[test]
    fn test_eastern_winter_offset() {
        // EST is UTC-5 in January.
        let utc = eastern_to_utc(naive(2025, 1, 15, 16, 0)).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-01-15T21:00:00+00:00");
    }

    #[test]
    fn test_dst_edge_times_are_rejected() {
        // 2025-11-02 01:30 happens twice; 2025-03-09 02:30 never happens.
        assert!(eastern_to_utc(naive(2025, 11, 2, 1, 30)).is_err());
        assert!(eastern_to_utc(naive(2025, 3, 9, 2, 30)).is_err());
    }
}
