//! Hyperrank: Hyperliquid trader discovery and ranking
//!
//! This is the root crate that provides benchmark access to the internal modules.
//! For actual functionality, use the individual crates directly:
//!
//! - `hyperliquid-core`: Core types, info API client, configuration
//! - `wallet-tracker`: Address merging, metrics, enrichment, ranking, tabular output
//! - `bot-scanner`: Single-wallet analysis report
//! - `wallet-ranker`: Batch pipeline binary

// Re-export for benchmarks
pub use hyperliquid_core as core;
pub use wallet_tracker as tracker;
