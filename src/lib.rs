//! Edge-Scan: Polymarket Holder Edge Scanner
//!
//! This is the root crate that provides benchmark access to the internal
//! modules. For actual functionality, use the individual crates directly:
//!
//! - `edge-core`: Config, stats, feature extraction, scoring, API clients
//! - `edge-scanner`: CLI that scans a market's holders and writes reports
//! - `earnings-logger`: CLI that logs resolution labels for earnings markets

// Re-export for benchmarks
pub use edge_core as core;
