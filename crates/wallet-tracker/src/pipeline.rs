//! End-to-end run: merge, enrich, rank and attach position snapshots.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hyperliquid_core::config::OutputConfig;
use hyperliquid_core::types::{EnrichedWallet, HistoryStatus, WalletAddress};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::discovery::{AddressMerger, MergeOutcome, SourceObservation};
use crate::enrichment::{EnrichmentConfig, Enricher};
use crate::ranking::{RankingConfig, RankingOutcome, Ranker};
use crate::report;

/// Which wallets get a point-in-time position snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionScope {
    None,
    /// Every enriched wallet.
    All,
    /// The best `limit` ranked survivors only.
    Ranked { limit: usize },
}

impl PositionScope {
    pub const DEFAULT_RANKED_LIMIT: usize = 50;
}

impl Default for PositionScope {
    fn default() -> Self {
        PositionScope::Ranked {
            limit: Self::DEFAULT_RANKED_LIMIT,
        }
    }
}

impl FromStr for PositionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(PositionScope::None),
            "all" => Ok(PositionScope::All),
            "ranked" | "top" => Ok(PositionScope::default()),
            other => Err(format!("unknown position scope: {other}")),
        }
    }
}

/// Component settings for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub enrichment: EnrichmentConfig,
    pub ranking: RankingConfig,
    pub positions: PositionScope,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            enrichment: EnrichmentConfig::from_env(),
            ranking: RankingConfig::from_env(),
            positions: PositionScope::default(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub merge: MergeOutcome,
    /// One row per merged wallet, ordered by canonical address.
    pub enriched: Vec<EnrichedWallet>,
    pub ranking: RankingOutcome,
}

impl PipelineReport {
    pub fn count_status(&self, status: HistoryStatus) -> usize {
        self.enriched
            .iter()
            .filter(|w| w.metrics.history_status == status)
            .count()
    }

    pub fn hyper_scrapers(&self) -> usize {
        self.enriched.iter().filter(|w| w.is_hyper_scraper()).count()
    }

    /// Write both tables under `output.dir`, creating it if needed.
    pub fn write_tables(&self, output: &OutputConfig) -> Result<()> {
        std::fs::create_dir_all(&output.dir)
            .with_context(|| format!("creating output dir {}", output.dir.display()))?;
        report::write_enriched_table(&output.enriched_path(), &self.enriched)?;
        report::write_ranked_table(&output.ranked_path(), &self.ranking.ranked)?;
        Ok(())
    }
}

/// Sequences merge, enrichment and ranking over one batch of observations.
pub struct Pipeline {
    enricher: Enricher,
    ranker: Ranker,
    positions: PositionScope,
}

impl Pipeline {
    pub fn new(enricher: Enricher, ranker: Ranker, positions: PositionScope) -> Self {
        Self {
            enricher,
            ranker,
            positions,
        }
    }

    /// Run the whole batch. Per-address failures are folded into the report.
    pub async fn run(&self, observations: Vec<SourceObservation>) -> PipelineReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id);
        self.run_inner(run_id, observations).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, observations: Vec<SourceObservation>) -> PipelineReport {
        let started_at = Utc::now();
        info!(observations = observations.len(), "Starting pipeline run");

        let merge = AddressMerger::merge(observations);
        let records = merge.records.values().cloned().collect();

        let mut enriched = self.enricher.enrich_all(records).await;

        if self.positions == PositionScope::All && self.enricher.has_positions() {
            let addresses: Vec<WalletAddress> =
                enriched.iter().map(|w| w.address().clone()).collect();
            let snapshots = self.enricher.fetch_positions(&addresses).await;
            for (wallet, snapshot) in enriched.iter_mut().zip(snapshots) {
                wallet.position = snapshot;
            }
        }

        let mut ranking = self.ranker.rank(&enriched);

        if let PositionScope::Ranked { limit } = self.positions {
            if self.enricher.has_positions() {
                self.attach_ranked_positions(&mut enriched, &mut ranking, limit)
                    .await;
            }
        }

        let report = PipelineReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            merge,
            enriched,
            ranking,
        };

        info!(
            wallets = report.enriched.len(),
            skipped = report.merge.skipped.len(),
            fetch_failed = report.count_status(HistoryStatus::FetchFailed),
            insufficient = report.count_status(HistoryStatus::Insufficient),
            hyper_scrapers = report.hyper_scrapers(),
            ranked = report.ranking.ranked.len(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Pipeline run complete"
        );

        report
    }

    async fn attach_ranked_positions(
        &self,
        enriched: &mut [EnrichedWallet],
        ranking: &mut RankingOutcome,
        limit: usize,
    ) {
        let top = ranking.ranked.len().min(limit);
        let addresses: Vec<WalletAddress> = ranking.ranked[..top]
            .iter()
            .map(|r| r.wallet.address().clone())
            .collect();
        let snapshots = self.enricher.fetch_positions(&addresses).await;

        let index: HashMap<String, usize> = enriched
            .iter()
            .enumerate()
            .map(|(i, w)| (w.address().canonical().to_string(), i))
            .collect();

        for (ranked, snapshot) in ranking.ranked.iter_mut().zip(snapshots) {
            if let Some(&i) = index.get(ranked.wallet.address().canonical()) {
                enriched[i].position = snapshot.clone();
            }
            ranked.wallet.position = snapshot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use hyperliquid_core::api::{HistorySource, PositionSource};
    use hyperliquid_core::types::{
        AccountValuePoint, HistoryFetch, PositionSnapshot, WalletHistory,
    };
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves fixed account-value series keyed by canonical address.
    struct StaticHistory {
        series: HashMap<String, Vec<f64>>,
    }

    #[async_trait::async_trait]
    impl HistorySource for StaticHistory {
        async fn fetch_history(
            &self,
            address: &WalletAddress,
        ) -> hyperliquid_core::Result<HistoryFetch> {
            let Some(values) = self.series.get(address.canonical()) else {
                return Err(hyperliquid_core::Error::Api {
                    message: "Server error: 500".to_string(),
                    status: Some(500),
                });
            };
            let start = Utc::now() - ChronoDuration::days(values.len() as i64);
            Ok(HistoryFetch::Data(WalletHistory::from_account_values(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| AccountValuePoint::new(start + ChronoDuration::days(i as i64), v))
                    .collect(),
            )))
        }
    }

    struct FlatPositions;

    #[async_trait::async_trait]
    impl PositionSource for FlatPositions {
        async fn fetch_positions(
            &self,
            _address: &WalletAddress,
        ) -> hyperliquid_core::Result<Option<PositionSnapshot>> {
            Ok(Some(PositionSnapshot {
                num_positions: 3,
                unrealized_pnl: Decimal::new(42, 0),
                account_value: Decimal::new(10_000, 0),
                total_margin_used: Decimal::new(2_500, 0),
                total_notional: Decimal::new(30_000, 0),
                fetched_at: Utc::now(),
            }))
        }
    }

    const GOOD: &str = "0x1111111111111111111111111111111111111111";
    const BETTER: &str = "0x2222222222222222222222222222222222222222";
    const FAILING: &str = "0x3333333333333333333333333333333333333333";

    fn pipeline(scope: PositionScope) -> Pipeline {
        let history = StaticHistory {
            series: HashMap::from([
                (GOOD.to_string(), vec![100.0, 101.0, 100.5, 102.0, 103.0, 104.5]),
                (BETTER.to_string(), vec![100.0, 102.0, 104.0, 103.5, 106.0, 108.0]),
            ]),
        };
        let config = EnrichmentConfig {
            max_concurrency: 2,
            min_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        };
        let enricher = Enricher::new(Arc::new(history), config).with_positions(Arc::new(FlatPositions));
        let ranker = Ranker::new(RankingConfig::default()).unwrap();
        Pipeline::new(enricher, ranker, scope)
    }

    fn observations() -> Vec<SourceObservation> {
        vec![
            SourceObservation::new(GOOD, "hyperdash", "2024-03-01T00:00:00Z"),
            SourceObservation::new(GOOD.to_uppercase().replacen("0X", "0x", 1), "coinglass", "2024-03-02"),
            SourceObservation::new(BETTER, "hyperdash", "2024-03-01T00:00:00Z"),
            SourceObservation::new(FAILING, "hyperdash", "2024-03-01T00:00:00Z"),
            SourceObservation::new("not-an-address", "hyperdash", "2024-03-01T00:00:00Z"),
        ]
    }

    #[tokio::test]
    async fn test_run_survives_fetch_failure() {
        let report = pipeline(PositionScope::None).run(observations()).await;

        assert_eq!(report.enriched.len(), 3);
        assert_eq!(report.merge.skipped.len(), 1);
        assert_eq!(report.count_status(HistoryStatus::FetchFailed), 1);
        assert_eq!(report.ranking.ranked.len(), 2);
        assert_eq!(report.ranking.summary.input, 3);
        assert!(report.enriched.iter().all(|w| w.position.is_none()));

        let good = &report.enriched[0];
        assert_eq!(good.record.sources(), &["hyperdash", "coinglass"]);
    }

    #[tokio::test]
    async fn test_ranked_scope_attaches_top_only() {
        let report = pipeline(PositionScope::Ranked { limit: 1 }).run(observations()).await;

        assert_eq!(report.ranking.ranked.len(), 2);
        assert!(report.ranking.ranked[0].wallet.position.is_some());
        assert!(report.ranking.ranked[1].wallet.position.is_none());

        let top = report.ranking.ranked[0].wallet.address().clone();
        let with_position: Vec<&EnrichedWallet> =
            report.enriched.iter().filter(|w| w.position.is_some()).collect();
        assert_eq!(with_position.len(), 1);
        assert_eq!(with_position[0].address(), &top);
    }

    #[tokio::test]
    async fn test_all_scope_attaches_everywhere() {
        let report = pipeline(PositionScope::All).run(observations()).await;
        assert!(report.enriched.iter().all(|w| w.position.is_some()));
        assert!(report.ranking.ranked.iter().all(|r| r.wallet.position.is_some()));
    }

    #[tokio::test]
    async fn test_empty_input_completes() {
        let report = pipeline(PositionScope::default()).run(Vec::new()).await;
        assert!(report.enriched.is_empty());
        assert!(report.ranking.ranked.is_empty());
    }

    #[tokio::test]
    async fn test_write_tables() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            dir: dir.path().join("out"),
            ..Default::default()
        };

        let report = pipeline(PositionScope::None).run(observations()).await;
        report.write_tables(&output).unwrap();

        let enriched = std::fs::read_to_string(output.enriched_path()).unwrap();
        let ranked = std::fs::read_to_string(output.ranked_path()).unwrap();
        assert_eq!(enriched.lines().count(), 4);
        assert_eq!(ranked.lines().count(), 3);
        assert!(enriched.contains("fetch_failed"));
    }

    #[test]
    fn test_position_scope_from_str() {
        assert_eq!("none".parse::<PositionScope>(), Ok(PositionScope::None));
        assert_eq!("ALL".parse::<PositionScope>(), Ok(PositionScope::All));
        assert_eq!(
            "ranked".parse::<PositionScope>(),
            Ok(PositionScope::Ranked { limit: 50 })
        );
        assert!("some".parse::<PositionScope>().is_err());
    }
}
