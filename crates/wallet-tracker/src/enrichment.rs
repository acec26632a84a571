//! Concurrent, rate-limited enrichment of merged wallet records.
//!
//! Each address is fetched independently. A failed or timed-out fetch
//! degrades that one wallet to `FetchFailed` and never aborts the batch.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use hyperliquid_core::api::{HistorySource, PositionSource};
use hyperliquid_core::types::{
    EnrichedWallet, HistoryFetch, HistoryStatus, HyperScraperDetector, PerformanceMetrics,
    PositionSnapshot, WalletAddress, WalletRecord,
};
use hyperliquid_core::Error;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::profitability::MetricsEngine;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Concurrency, pacing and timeout for external fetches.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Maximum fetches in flight.
    pub max_concurrency: usize,
    /// Minimum spacing between request starts. Zero disables pacing.
    pub min_interval: Duration,
    /// Per-address deadline, covering the client's own retries.
    pub request_timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            min_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EnrichmentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrency: env::var("ENRICH_MAX_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrency),
            min_interval: env::var("ENRICH_MIN_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_interval),
            request_timeout: env::var("ENRICH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

/// Fetches history (and optionally positions) and turns it into enriched wallets.
pub struct Enricher {
    history: Arc<dyn HistorySource>,
    positions: Option<Arc<dyn PositionSource>>,
    engine: MetricsEngine,
    detector: HyperScraperDetector,
    config: EnrichmentConfig,
    limiter: Option<Arc<DirectLimiter>>,
}

impl Enricher {
    pub fn new(history: Arc<dyn HistorySource>, config: EnrichmentConfig) -> Self {
        // One token per interval, burst of one
        let limiter = Quota::with_period(config.min_interval)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self {
            history,
            positions: None,
            engine: MetricsEngine::default(),
            detector: HyperScraperDetector::default(),
            config,
            limiter,
        }
    }

    pub fn with_positions(mut self, positions: Arc<dyn PositionSource>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn with_engine(mut self, engine: MetricsEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_detector(mut self, detector: HyperScraperDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn has_positions(&self) -> bool {
        self.positions.is_some()
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Enrich every record. Output order matches input order.
    pub async fn enrich_all(&self, records: Vec<WalletRecord>) -> Vec<EnrichedWallet> {
        let now = Utc::now();
        let mut slots: Vec<Option<EnrichedWallet>> = (0..records.len()).map(|_| None).collect();

        let results: Vec<(usize, EnrichedWallet)> = stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| async move { (index, self.enrich_one(record, now).await) })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for (index, wallet) in results {
            slots[index] = Some(wallet);
        }
        slots.into_iter().flatten().collect()
    }

    /// Enrich a single record as of `now`.
    pub async fn enrich_one(&self, record: WalletRecord, now: DateTime<Utc>) -> EnrichedWallet {
        let metrics = match self.fetch_history(record.address()).await {
            Ok(fetch) => self.engine.compute_fetch(&fetch, now),
            Err(e) => {
                warn!(
                    address = %record.address(),
                    error = %e,
                    "History fetch failed, degrading wallet"
                );
                PerformanceMetrics::undefined(HistoryStatus::FetchFailed)
            }
        };

        if metrics.history_truncated {
            warn!(
                address = %record.address(),
                trades = metrics.total_trades,
                "Trade log truncated at page cap"
            );
        }

        let wallet = EnrichedWallet::new(record, metrics, &self.detector);
        if wallet.is_hyper_scraper() {
            debug!(
                address = %wallet.address(),
                signals = ?self.detector.signals(&wallet.metrics),
                "Flagged hyper scraper"
            );
        }
        wallet
    }

    /// Fetch position snapshots for `addresses`, one slot per address.
    ///
    /// Returns all `None` when no position source is configured.
    pub async fn fetch_positions(&self, addresses: &[WalletAddress]) -> Vec<Option<PositionSnapshot>> {
        let Some(source) = self.positions.as_ref() else {
            return vec![None; addresses.len()];
        };

        let mut slots: Vec<Option<PositionSnapshot>> = vec![None; addresses.len()];
        let results: Vec<(usize, Option<PositionSnapshot>)> =
            stream::iter(addresses.iter().enumerate())
                .map(|(index, address)| async move {
                    (index, self.fetch_position(source.as_ref(), address).await)
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;

        for (index, snapshot) in results {
            slots[index] = snapshot;
        }
        slots
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn fetch_history(&self, address: &WalletAddress) -> hyperliquid_core::Result<HistoryFetch> {
        self.throttle().await;
        tokio::time::timeout(self.config.request_timeout, self.history.fetch_history(address))
            .await
            .map_err(|_| Error::Timeout {
                address: address.to_string(),
                after_secs: self.config.request_timeout.as_secs(),
            })?
    }

    async fn fetch_position(
        &self,
        source: &dyn PositionSource,
        address: &WalletAddress,
    ) -> Option<PositionSnapshot> {
        self.throttle().await;
        let result = tokio::time::timeout(self.config.request_timeout, source.fetch_positions(address))
            .await
            .map_err(|_| Error::Timeout {
                address: address.to_string(),
                after_secs: self.config.request_timeout.as_secs(),
            })
            .and_then(|r| r);

        match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(address = %address, error = %e, "Position fetch failed");
                None
            }
        }
    }
}
