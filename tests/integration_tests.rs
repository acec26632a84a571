//! Integration tests for component interactions.
//!
//! These tests verify that the merge, enrichment, ranking and output stages
//! work together correctly.

use chrono::{Duration, Utc};
use hyperliquid_core::api::{HistorySource, PositionSource};
use hyperliquid_core::config::OutputConfig;
use hyperliquid_core::types::{
    AccountValuePoint, EnrichedWallet, HistoryFetch, HistoryStatus, HyperScraperDetector,
    PerformanceMetrics, PositionSnapshot, TradeEvent, TradeSide, WalletAddress, WalletHistory,
    WalletRecord,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use wallet_tracker::report::read_observations;
use wallet_tracker::{
    AddressMerger, Enricher, EnrichmentConfig, FilterReason, Pipeline, PositionScope, Ranker,
    RankingConfig, SourceObservation,
};

const STEADY: &str = "0xa1b2c3d4e5f60000000000000000000000000001";
const WILD: &str = "0xb2c3d4e5f6a10000000000000000000000000002";
const FLAT: &str = "0xc3d4e5f6a1b20000000000000000000000000003";
const BOT: &str = "0xd4e5f6a1b2c30000000000000000000000000004";
const EMPTY: &str = "0xe5f6a1b2c3d40000000000000000000000000005";
const BROKEN: &str = "0xf6a1b2c3d4e50000000000000000000000000006";

fn wallet_with(address: &str, sharpe: f64, drawdown: f64, win_rate: f64) -> EnrichedWallet {
    let record = WalletRecord::new(WalletAddress::parse(address).unwrap(), "test", Utc::now());
    let mut metrics = PerformanceMetrics::undefined(HistoryStatus::Sufficient);
    metrics.sharpe_ratio = Some(sharpe);
    metrics.max_drawdown = Some(drawdown);
    metrics.win_rate = Some(win_rate);
    metrics.trader_age_days = 200;
    metrics.total_trades = 80;
    EnrichedWallet::new(record, metrics, &HyperScraperDetector::default())
}

/// Three wallets, one fails min Sharpe and one fails max drawdown.
#[test]
fn test_end_to_end_ranking_scenario() {
    let wallets = vec![
        wallet_with(STEADY, 1.0, 0.1, 0.6),
        wallet_with(WILD, 2.0, 0.2, 0.6),
        wallet_with(FLAT, 3.0, 0.6, 0.6),
    ];

    let outcome = Ranker::new(RankingConfig::default()).unwrap().rank(&wallets);

    assert_eq!(outcome.ranked.len(), 1);
    let only = &outcome.ranked[0];
    assert_eq!(only.wallet.address().canonical(), WILD);
    assert_eq!(only.rank, 1);
    // Single-element cohort: every range is zero, so only epsilon remains
    assert_eq!(only.sharpe_normalized, 0.0);
    assert_eq!(only.drawdown_normalized, 1.0);
    assert_eq!(only.winrate_normalized, 0.0);
    assert!((only.performance_score - 0.3).abs() < 1e-12);

    assert_eq!(outcome.summary.count(FilterReason::SharpeBelowMin), 1);
    assert_eq!(outcome.summary.count(FilterReason::DrawdownAboveMax), 1);
}

/// Cohort bounds ignore wallets that were filtered out.
#[test]
fn test_normalization_bound_isolation() {
    let mut wallets = vec![
        wallet_with(STEADY, 1.5, 0.1, 0.5),
        wallet_with(WILD, 2.0, 0.1, 0.5),
        wallet_with(FLAT, 3.0, 0.1, 0.5),
    ];
    let baseline = Ranker::new(RankingConfig::default()).unwrap().rank(&wallets);

    wallets.push(wallet_with(BOT, 0.3, 0.1, 0.5));
    wallets.push(wallet_with(EMPTY, 12.0, 0.8, 0.5));
    let with_outliers = Ranker::new(RankingConfig::default()).unwrap().rank(&wallets);

    assert_eq!(with_outliers.ranked.len(), 3);
    for (a, b) in baseline.ranked.iter().zip(&with_outliers.ranked) {
        assert_eq!(a.wallet.address(), b.wallet.address());
        assert_eq!(a.sharpe_normalized, b.sharpe_normalized);
        assert_eq!(a.performance_score, b.performance_score);
    }

    let lowest = with_outliers
        .ranked
        .iter()
        .find(|r| r.wallet.address().canonical() == STEADY)
        .unwrap();
    assert!(lowest.sharpe_normalized.abs() < 1e-6);
    assert_eq!(with_outliers.ranked[0].wallet.address().canonical(), FLAT);
    assert!((with_outliers.ranked[0].sharpe_normalized - 1.0).abs() < 1e-6);
}

/// History source backed by fixed fixtures; unknown addresses fail.
struct FixtureHistory {
    fixtures: HashMap<String, HistoryFetch>,
}

impl FixtureHistory {
    fn new() -> Self {
        let mut fixtures = HashMap::new();
        fixtures.insert(
            STEADY.to_string(),
            HistoryFetch::Data(series(&[100.0, 101.0, 100.5, 102.0, 103.0, 104.5], 0)),
        );
        fixtures.insert(
            WILD.to_string(),
            HistoryFetch::Data(series(&[100.0, 80.0, 120.0, 50.0, 90.0], 0)),
        );
        fixtures.insert(
            FLAT.to_string(),
            HistoryFetch::Data(series(&[1000.0, 1000.0, 1000.0, 1000.0], 0)),
        );
        fixtures.insert(
            BOT.to_string(),
            HistoryFetch::Data(series(&[100.0, 102.0, 101.5, 103.0, 104.0, 105.5], 5000)),
        );
        fixtures.insert(EMPTY.to_string(), HistoryFetch::NoData);
        Self { fixtures }
    }
}

fn series(values: &[f64], trades: usize) -> WalletHistory {
    let start = Utc::now() - Duration::days(values.len() as i64);
    let account_values = values
        .iter()
        .enumerate()
        .map(|(i, &v)| AccountValuePoint::new(start + Duration::days(i as i64), v))
        .collect();
    let trades = (0..trades)
        .map(|i| TradeEvent {
            timestamp: start + Duration::minutes(i as i64),
            coin: "ETH".to_string(),
            side: if i % 2 == 0 { TradeSide::Buy } else { TradeSide::Sell },
            price: Decimal::new(3000, 0),
            size: Decimal::new(1, 1),
            closed_pnl: Decimal::ZERO,
            fee: Decimal::new(1, 2),
        })
        .collect();

    WalletHistory {
        account_values,
        cumulative_pnl: Vec::new(),
        trades,
        truncated: false,
    }
}

#[async_trait::async_trait]
impl HistorySource for FixtureHistory {
    async fn fetch_history(
        &self,
        address: &WalletAddress,
    ) -> hyperliquid_core::Result<HistoryFetch> {
        self.fixtures
            .get(address.canonical())
            .cloned()
            .ok_or_else(|| hyperliquid_core::Error::Api {
                message: "Server error: 503".to_string(),
                status: Some(503),
            })
    }
}

struct FixturePositions;

#[async_trait::async_trait]
impl PositionSource for FixturePositions {
    async fn fetch_positions(
        &self,
        _address: &WalletAddress,
    ) -> hyperliquid_core::Result<Option<PositionSnapshot>> {
        Ok(Some(PositionSnapshot {
            num_positions: 1,
            unrealized_pnl: Decimal::new(75, 0),
            account_value: Decimal::new(5_000, 0),
            total_margin_used: Decimal::new(1_000, 0),
            total_notional: Decimal::new(8_000, 0),
            fetched_at: Utc::now(),
        }))
    }
}

fn fixture_pipeline(ranking: RankingConfig, scope: PositionScope) -> Pipeline {
    let config = EnrichmentConfig {
        max_concurrency: 3,
        min_interval: std::time::Duration::ZERO,
        request_timeout: std::time::Duration::from_secs(5),
    };
    let enricher = Enricher::new(Arc::new(FixtureHistory::new()), config)
        .with_positions(Arc::new(FixturePositions));
    Pipeline::new(enricher, Ranker::new(ranking).unwrap(), scope)
}

fn scraped_csv() -> String {
    let shouted = STEADY.to_uppercase().replacen("0X", "0x", 1);
    let mut csv = String::from("address,source,scraped_at\n");
    for (address, source, day) in [
        (STEADY, "hyperdash", 3),
        (shouted.as_str(), "coinglass", 1),
        (WILD, "hyperdash", 2),
        (FLAT, "coinglass", 2),
        (BOT, "hyperdash", 2),
        (EMPTY, "hypurrscan", 2),
        (BROKEN, "hypurrscan", 2),
        ("0xdeadbeef", "hypurrscan", 2),
    ] {
        csv.push_str(&format!("{address},{source},2024-03-{day:02}T00:00:00Z\n"));
    }
    csv
}

#[tokio::test]
async fn test_pipeline_from_csv_to_tables() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scraped.csv");
    std::fs::write(&input, scraped_csv()).unwrap();

    let observations = read_observations(&input).unwrap();
    assert_eq!(observations.len(), 8);

    let pipeline = fixture_pipeline(RankingConfig::default(), PositionScope::Ranked { limit: 10 });
    let report = pipeline.run(observations).await;

    assert_eq!(report.merge.skipped.len(), 1);
    assert_eq!(report.merge.duplicates, 1);
    assert_eq!(report.enriched.len(), 6);
    assert_eq!(report.count_status(HistoryStatus::FetchFailed), 1);
    assert_eq!(report.count_status(HistoryStatus::Insufficient), 1);
    assert_eq!(report.hyper_scrapers(), 1);

    // Only the steady wallet passes every filter
    assert_eq!(report.ranking.ranked.len(), 1);
    let top = &report.ranking.ranked[0];
    assert_eq!(top.wallet.address().canonical(), STEADY);
    assert_eq!(top.wallet.record.sources(), &["hyperdash", "coinglass"]);
    assert!(top.wallet.position.is_some());
    assert_eq!(report.ranking.summary.count(FilterReason::UndefinedSharpe), 3);
    assert_eq!(report.ranking.summary.count(FilterReason::DrawdownAboveMax), 1);
    assert_eq!(report.ranking.summary.count(FilterReason::HyperScraper), 1);

    let output = OutputConfig {
        dir: dir.path().join("out"),
        ..Default::default()
    };
    report.write_tables(&output).unwrap();

    let enriched = std::fs::read_to_string(output.enriched_path()).unwrap();
    let ranked = std::fs::read_to_string(output.ranked_path()).unwrap();
    assert_eq!(enriched.lines().count(), 7);
    assert_eq!(ranked.lines().count(), 2);
    assert!(ranked.lines().nth(1).unwrap().ends_with(",1"));
}

#[tokio::test]
async fn test_pipeline_including_hyper_scrapers() {
    let observations = vec![
        SourceObservation::new(STEADY, "hyperdash", "2024-03-01"),
        SourceObservation::new(BOT, "hyperdash", "2024-03-01"),
    ];
    let pipeline = fixture_pipeline(
        RankingConfig::new().include_hyper_scrapers(),
        PositionScope::None,
    );
    let report = pipeline.run(observations).await;

    assert_eq!(report.ranking.ranked.len(), 2);
    assert!(report.ranking.ranked.iter().all(|r| r.wallet.position.is_none()));
    let ranks: Vec<usize> = report.ranking.ranked.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2]);
}

#[tokio::test]
async fn test_pipeline_is_deterministic() {
    let observations = || {
        vec![
            SourceObservation::new(BOT, "hyperdash", "2024-03-01"),
            SourceObservation::new(STEADY, "hyperdash", "2024-03-01"),
            SourceObservation::new(WILD, "coinglass", "2024-03-01"),
        ]
    };
    let config = RankingConfig::new().include_hyper_scrapers().max_drawdown(1.0);

    let first = fixture_pipeline(config.clone(), PositionScope::None)
        .run(observations())
        .await;
    let second = fixture_pipeline(config, PositionScope::None)
        .run(observations())
        .await;

    let order = |r: &wallet_tracker::PipelineReport| -> Vec<(String, usize)> {
        r.ranking
            .ranked
            .iter()
            .map(|w| (w.wallet.address().canonical().to_string(), w.rank))
            .collect()
    };
    assert_eq!(order(&first), order(&second));
    assert_eq!(first.ranking.ranked.len(), 3);
}

#[test]
fn test_merge_then_rank_uses_canonical_keys() {
    let outcome = AddressMerger::merge(vec![
        SourceObservation::new(STEADY.to_uppercase().replacen("0X", "0x", 1), "a", "2024-03-01"),
        SourceObservation::new(STEADY, "b", "2024-03-02"),
    ]);
    assert_eq!(outcome.len(), 1);
    assert_eq!(outcome.source_count(), 2);

    let record = outcome.into_records().remove(0);
    assert_eq!(record.address().canonical(), STEADY);
    assert_ne!(record.address().display(), STEADY);
}
