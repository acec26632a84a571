//! Collaborator traits consumed by the enrichment stage.

use crate::types::{HistoryFetch, PositionSnapshot, WalletAddress};
use crate::Result;

/// Supplies a wallet's account-value series and trade log.
///
/// Implementations retry transient failures themselves; an `Err` means the
/// fetch is abandoned for this address.
#[async_trait::async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, address: &WalletAddress) -> Result<HistoryFetch>;
}

/// Supplies a point-in-time position snapshot.
#[async_trait::async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_positions(&self, address: &WalletAddress) -> Result<Option<PositionSnapshot>>;
}
