//! Wallet records as they move through merge, enrichment and ranking.

use super::{HyperScraperDetector, PerformanceMetrics, PositionSnapshot, WalletAddress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deduplicated wallet with its source provenance.
///
/// The address never changes after creation and the source list only grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    address: WalletAddress,
    sources: Vec<String>,
    first_seen_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn new(address: WalletAddress, source: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            address,
            sources: vec![source.into()],
            first_seen_at: seen_at,
        }
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    /// Source identifiers in first-observed order, without duplicates.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn first_seen_at(&self) -> DateTime<Utc> {
        self.first_seen_at
    }

    pub fn has_source(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }

    /// Fold another observation of the same wallet into this record.
    ///
    /// Returns `true` if `source` was not already listed.
    pub fn observe(&mut self, source: &str, seen_at: DateTime<Utc>) -> bool {
        if seen_at < self.first_seen_at {
            self.first_seen_at = seen_at;
        }
        if self.has_source(source) {
            return false;
        }
        self.sources.push(source.to_string());
        true
    }
}

/// A wallet record with performance metrics attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedWallet {
    pub record: WalletRecord,
    pub metrics: PerformanceMetrics,
    /// Point-in-time snapshot, present only when positions were requested.
    pub position: Option<PositionSnapshot>,
    is_hyper_scraper: bool,
}

impl EnrichedWallet {
    /// Attach metrics and derive the hyper-scraper flag from them.
    pub fn new(
        record: WalletRecord,
        metrics: PerformanceMetrics,
        detector: &HyperScraperDetector,
    ) -> Self {
        let is_hyper_scraper = detector.classify(&metrics);
        Self {
            record,
            metrics,
            position: None,
            is_hyper_scraper,
        }
    }

    pub fn with_position(mut self, position: Option<PositionSnapshot>) -> Self {
        self.position = position;
        self
    }

    pub fn address(&self) -> &WalletAddress {
        self.record.address()
    }

    pub fn is_hyper_scraper(&self) -> bool {
        self.is_hyper_scraper
    }
}
