//! Address merging across scraped leaderboard sources.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use hyperliquid_core::types::{WalletAddress, WalletRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One address sighting as produced by a source scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceObservation {
    pub address: String,
    pub source: String,
    /// ISO-8601 timestamp of the scrape.
    pub observed_at: String,
}

impl SourceObservation {
    pub fn new(
        address: impl Into<String>,
        source: impl Into<String>,
        observed_at: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            source: source.into(),
            observed_at: observed_at.into(),
        }
    }
}

/// Why an observation was left out of the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidAddress,
    InvalidTimestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedObservation {
    pub observation: SourceObservation,
    pub reason: SkipReason,
}

/// Deduplicated records plus bookkeeping about what was folded or skipped.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Keyed by canonical address.
    pub records: BTreeMap<String, WalletRecord>,
    pub skipped: Vec<SkippedObservation>,
    /// Observations folded into an already-known record.
    pub duplicates: usize,
    sources: BTreeSet<String>,
}

impl MergeOutcome {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, canonical: &str) -> Option<&WalletRecord> {
        self.records.get(canonical)
    }

    /// Number of distinct source identifiers seen across valid observations.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Records ordered by canonical address.
    pub fn into_records(self) -> Vec<WalletRecord> {
        self.records.into_values().collect()
    }
}

/// Folds source observations into one record per canonical address.
#[derive(Debug, Default)]
pub struct AddressMerger {
    outcome: MergeOutcome,
}

impl AddressMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue merging on top of an earlier outcome.
    pub fn resume(outcome: MergeOutcome) -> Self {
        Self { outcome }
    }

    /// Merge a whole batch in one call.
    pub fn merge<I>(observations: I) -> MergeOutcome
    where
        I: IntoIterator<Item = SourceObservation>,
    {
        let mut merger = Self::new();
        merger.extend(observations);
        merger.finish()
    }

    pub fn extend<I>(&mut self, observations: I)
    where
        I: IntoIterator<Item = SourceObservation>,
    {
        for observation in observations {
            self.add(observation);
        }
    }

    /// Fold a single observation. Malformed input is recorded as skipped.
    pub fn add(&mut self, observation: SourceObservation) {
        let address = match WalletAddress::parse(&observation.address) {
            Ok(address) => address,
            Err(_) => return self.skip(observation, SkipReason::InvalidAddress),
        };
        let Some(seen_at) = parse_timestamp(&observation.observed_at) else {
            return self.skip(observation, SkipReason::InvalidTimestamp);
        };

        let source = observation.source.trim();
        if !self.outcome.sources.contains(source) {
            self.outcome.sources.insert(source.to_string());
        }

        match self.outcome.records.get_mut(address.canonical()) {
            Some(record) => {
                record.observe(source, seen_at);
                self.outcome.duplicates += 1;
            }
            None => {
                let key = address.canonical().to_string();
                self.outcome
                    .records
                    .insert(key, WalletRecord::new(address, source, seen_at));
            }
        }
    }

    pub fn finish(self) -> MergeOutcome {
        info!(
            records = self.outcome.records.len(),
            sources = self.outcome.sources.len(),
            duplicates = self.outcome.duplicates,
            skipped = self.outcome.skipped.len(),
            "Merged source observations"
        );
        self.outcome
    }

    fn skip(&mut self, observation: SourceObservation, reason: SkipReason) {
        debug!(
            address = %observation.address,
            source = %observation.source,
            reason = ?reason,
            "Skipping observation"
        );
        self.outcome
            .skipped
            .push(SkippedObservation { observation, reason });
    }
}

/// Parse a scraper timestamp.
///
/// RFC 3339 is preferred; naive date-times and bare dates are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
