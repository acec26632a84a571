//! Filtering, cohort normalization and composite ranking of enriched wallets.
//!
//! Normalization bounds are taken from the wallets that survive the filter
//! stage only, so a filtered-out outlier never shifts anyone's score.

use hyperliquid_core::types::EnrichedWallet;
use hyperliquid_core::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use tracing::{debug, info};

/// Tolerance on the weight sum.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Composite score weights. Must be non-negative and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub sharpe: f64,
    pub drawdown: f64,
    pub win_rate: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            sharpe: 0.5,
            drawdown: 0.3,
            win_rate: 0.2,
        }
    }
}

impl RankingWeights {
    pub fn new(sharpe: f64, drawdown: f64, win_rate: f64) -> Self {
        Self {
            sharpe,
            drawdown,
            win_rate,
        }
    }

    pub fn sum(&self) -> f64 {
        self.sharpe + self.drawdown + self.win_rate
    }

    pub fn validate(&self) -> hyperliquid_core::Result<()> {
        let sum = self.sum();
        let negative = [self.sharpe, self.drawdown, self.win_rate]
            .iter()
            .any(|w| *w < 0.0);
        if negative || !sum.is_finite() || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::InvalidWeights { sum });
        }
        Ok(())
    }
}

/// Denominator stabilizer for min-max normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum EpsilonMode {
    /// The same constant for every metric.
    Absolute(f64),
    /// `k * range` per metric, or `k` when the range is zero.
    Relative(f64),
}

impl Default for EpsilonMode {
    fn default() -> Self {
        EpsilonMode::Absolute(1e-6)
    }
}

impl EpsilonMode {
    fn resolve(&self, range: f64) -> f64 {
        match *self {
            EpsilonMode::Absolute(eps) => eps,
            EpsilonMode::Relative(k) if range > 0.0 => k * range,
            EpsilonMode::Relative(k) => k,
        }
    }
}

/// Filter thresholds, weights and normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub min_sharpe: f64,
    pub max_drawdown: f64,
    pub exclude_hyper_scrapers: bool,
    pub weights: RankingWeights,
    pub epsilon: EpsilonMode,
    /// Drop implausibly high Sharpe ratios. Off by default.
    pub max_sharpe: Option<f64>,
    pub min_total_trades: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_sharpe: 1.5,
            max_drawdown: 0.5,
            exclude_hyper_scrapers: true,
            weights: RankingWeights::default(),
            epsilon: EpsilonMode::default(),
            max_sharpe: None,
            min_total_trades: 0,
        }
    }
}

impl RankingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `RANK_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parse_f64 = |key: &str, default: f64| {
            env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let eps = parse_f64("RANK_EPSILON", 1e-6);
        let epsilon = match env::var("RANK_EPSILON_MODE").as_deref() {
            Ok("relative") => EpsilonMode::Relative(eps),
            _ => EpsilonMode::Absolute(eps),
        };

        Self {
            min_sharpe: parse_f64("RANK_MIN_SHARPE", defaults.min_sharpe),
            max_drawdown: parse_f64("RANK_MAX_DRAWDOWN", defaults.max_drawdown),
            exclude_hyper_scrapers: env::var("RANK_EXCLUDE_HYPER_SCRAPERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.exclude_hyper_scrapers),
            weights: RankingWeights {
                sharpe: parse_f64("RANK_WEIGHT_SHARPE", defaults.weights.sharpe),
                drawdown: parse_f64("RANK_WEIGHT_DRAWDOWN", defaults.weights.drawdown),
                win_rate: parse_f64("RANK_WEIGHT_WINRATE", defaults.weights.win_rate),
            },
            epsilon,
            max_sharpe: env::var("RANK_MAX_SHARPE").ok().and_then(|s| s.parse().ok()),
            min_total_trades: env::var("RANK_MIN_TOTAL_TRADES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_total_trades),
        }
    }

    pub fn min_sharpe(mut self, min: f64) -> Self {
        self.min_sharpe = min;
        self
    }

    pub fn max_drawdown(mut self, max: f64) -> Self {
        self.max_drawdown = max;
        self
    }

    pub fn include_hyper_scrapers(mut self) -> Self {
        self.exclude_hyper_scrapers = false;
        self
    }

    pub fn weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn epsilon(mut self, epsilon: EpsilonMode) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn max_sharpe(mut self, max: f64) -> Self {
        self.max_sharpe = Some(max);
        self
    }

    pub fn min_total_trades(mut self, min: u64) -> Self {
        self.min_total_trades = min;
        self
    }

    pub fn validate(&self) -> hyperliquid_core::Result<()> {
        self.weights.validate()?;
        let eps = match self.epsilon {
            EpsilonMode::Absolute(eps) | EpsilonMode::Relative(eps) => eps,
        };
        if !(eps > 0.0 && eps.is_finite()) {
            return Err(Error::Config {
                message: format!("epsilon must be a positive number (got {eps})"),
            });
        }
        Ok(())
    }
}

/// First filter a wallet failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    UndefinedSharpe,
    SharpeBelowMin,
    SharpeAboveMax,
    UndefinedDrawdown,
    DrawdownAboveMax,
    UndefinedWinRate,
    TooFewTrades,
    HyperScraper,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterReason::UndefinedSharpe => "undefined_sharpe",
            FilterReason::SharpeBelowMin => "sharpe_below_min",
            FilterReason::SharpeAboveMax => "sharpe_above_max",
            FilterReason::UndefinedDrawdown => "undefined_drawdown",
            FilterReason::DrawdownAboveMax => "drawdown_above_max",
            FilterReason::UndefinedWinRate => "undefined_win_rate",
            FilterReason::TooFewTrades => "too_few_trades",
            FilterReason::HyperScraper => "hyper_scraper",
        }
    }
}

/// Counts of what the filter stage kept and dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSummary {
    pub input: usize,
    pub passed: usize,
    pub rejected: BTreeMap<FilterReason, usize>,
}

impl FilterSummary {
    pub fn count(&self, reason: FilterReason) -> usize {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// An enriched wallet that survived filtering, with its score and rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedWallet {
    pub wallet: EnrichedWallet,
    pub sharpe_normalized: f64,
    pub drawdown_normalized: f64,
    pub winrate_normalized: f64,
    pub performance_score: f64,
    /// 1 is best.
    pub rank: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RankingOutcome {
    pub ranked: Vec<RankedWallet>,
    pub summary: FilterSummary,
}

/// Metric values of a wallet that passed every filter.
#[derive(Debug, Clone, Copy)]
struct Survivor {
    index: usize,
    sharpe: f64,
    drawdown: f64,
    win_rate: f64,
}

/// Min and max of one metric over the cohort.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: f64,
    max: f64,
}

impl Bounds {
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        values.fold(None, |acc, v| match acc {
            None => Some(Bounds { min: v, max: v }),
            Some(b) => Some(Bounds {
                min: b.min.min(v),
                max: b.max.max(v),
            }),
        })
    }

    fn normalize(&self, value: f64, epsilon: EpsilonMode) -> f64 {
        let range = self.max - self.min;
        ((value - self.min) / (range + epsilon.resolve(range))).clamp(0.0, 1.0)
    }
}

/// Filters, normalizes, scores and ranks a batch of enriched wallets.
#[derive(Debug, Clone)]
pub struct Ranker {
    config: RankingConfig,
}

impl Ranker {
    pub fn new(config: RankingConfig) -> hyperliquid_core::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Rank the whole batch. Empty or fully filtered input yields an empty table.
    pub fn rank(&self, wallets: &[EnrichedWallet]) -> RankingOutcome {
        let mut summary = FilterSummary {
            input: wallets.len(),
            ..Default::default()
        };

        let mut survivors = Vec::new();
        for (index, wallet) in wallets.iter().enumerate() {
            match self.check(index, wallet) {
                Ok(survivor) => survivors.push(survivor),
                Err(reason) => {
                    debug!(
                        address = %wallet.address(),
                        reason = reason.as_str(),
                        "Filtered wallet"
                    );
                    *summary.rejected.entry(reason).or_insert(0) += 1;
                }
            }
        }
        summary.passed = survivors.len();

        let ranked = self.score_cohort(wallets, &survivors);

        info!(
            input = summary.input,
            passed = summary.passed,
            rejected = summary.total_rejected(),
            top_score = ranked.first().map(|r| r.performance_score),
            "Ranked wallets"
        );

        RankingOutcome { ranked, summary }
    }

    fn check(&self, index: usize, wallet: &EnrichedWallet) -> Result<Survivor, FilterReason> {
        let metrics = &wallet.metrics;

        let sharpe = metrics.sharpe_ratio.ok_or(FilterReason::UndefinedSharpe)?;
        if sharpe < self.config.min_sharpe {
            return Err(FilterReason::SharpeBelowMin);
        }
        if self.config.max_sharpe.is_some_and(|max| sharpe > max) {
            return Err(FilterReason::SharpeAboveMax);
        }

        let drawdown = metrics.max_drawdown.ok_or(FilterReason::UndefinedDrawdown)?;
        if drawdown > self.config.max_drawdown {
            return Err(FilterReason::DrawdownAboveMax);
        }

        let win_rate = metrics.win_rate.ok_or(FilterReason::UndefinedWinRate)?;

        if metrics.total_trades < self.config.min_total_trades {
            return Err(FilterReason::TooFewTrades);
        }
        if self.config.exclude_hyper_scrapers && wallet.is_hyper_scraper() {
            return Err(FilterReason::HyperScraper);
        }

        Ok(Survivor {
            index,
            sharpe,
            drawdown,
            win_rate,
        })
    }

    fn score_cohort(&self, wallets: &[EnrichedWallet], survivors: &[Survivor]) -> Vec<RankedWallet> {
        let (Some(sharpe), Some(drawdown), Some(win_rate)) = (
            Bounds::of(survivors.iter().map(|s| s.sharpe)),
            Bounds::of(survivors.iter().map(|s| s.drawdown)),
            Bounds::of(survivors.iter().map(|s| s.win_rate)),
        ) else {
            return Vec::new();
        };

        let eps = self.config.epsilon;
        let weights = self.config.weights;

        let mut ranked: Vec<RankedWallet> = survivors
            .iter()
            .map(|s| {
                let sharpe_normalized = sharpe.normalize(s.sharpe, eps);
                // Lower drawdown is better
                let drawdown_normalized = 1.0 - drawdown.normalize(s.drawdown, eps);
                let winrate_normalized = win_rate.normalize(s.win_rate, eps);
                let performance_score = weights.sharpe * sharpe_normalized
                    + weights.drawdown * drawdown_normalized
                    + weights.win_rate * winrate_normalized;

                RankedWallet {
                    wallet: wallets[s.index].clone(),
                    sharpe_normalized,
                    drawdown_normalized,
                    winrate_normalized,
                    performance_score,
                    rank: 0,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.performance_score
                .total_cmp(&a.performance_score)
                .then_with(|| a.wallet.address().cmp(b.wallet.address()))
        });
        for (i, r) in ranked.iter_mut().enumerate() {
            r.rank = i + 1;
        }

        ranked
    }
}
