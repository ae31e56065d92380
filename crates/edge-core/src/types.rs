//! Core domain types for the edge scanner.

pub mod market;
pub mod wallet;

pub use market::*;
pub use wallet::*;
