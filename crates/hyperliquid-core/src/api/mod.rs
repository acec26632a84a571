//! API clients and collaborator traits for external data.

pub mod info;
pub mod source;

pub use info::HyperliquidClient;
pub use source::{HistorySource, PositionSource};
