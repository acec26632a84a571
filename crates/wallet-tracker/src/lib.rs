//! Wallet Tracker
//!
//! Merge scraped Hyperliquid trader addresses, enrich them with performance
//! metrics and rank the ones worth following.

pub mod discovery;
pub mod enrichment;
pub mod pipeline;
pub mod profitability;
pub mod ranking;
pub mod report;

pub use discovery::{AddressMerger, MergeOutcome, SkipReason, SourceObservation};
pub use enrichment::{Enricher, EnrichmentConfig};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, PositionScope};
pub use profitability::{MetricsConfig, MetricsEngine};
pub use ranking::{
    EpsilonMode, FilterReason, FilterSummary, RankedWallet, Ranker, RankingConfig,
    RankingOutcome, RankingWeights,
};
