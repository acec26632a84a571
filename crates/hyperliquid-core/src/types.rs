//! Core domain types for the wallet ranking system.

pub mod address;
pub mod bot;
pub mod history;
pub mod metrics;
pub mod position;
pub mod wallet;

pub use address::*;
pub use bot::*;
pub use history::*;
pub use metrics::*;
pub use position::*;
pub use wallet::*;
