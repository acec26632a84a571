//! Hyperliquid Core Library
//!
//! Shared types, configuration and the info-API client used by the wallet
//! discovery and ranking pipeline.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
