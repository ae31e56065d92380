//! Core library for the Polymarket earnings edge scanner.
//!
//! Provides the configuration layer, the read-only API clients (Gamma,
//! Data-API, CLOB), the per-wallet behavioral feature extractor and the
//! market-level scoring pipeline shared by the `edge-scanner` and
//! `earnings-logger` binaries.

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod scoring;
pub mod stats;
pub mod types;

pub use error::{Error, Result};
