//! Per-provider latency samples and the summaries derived from them.
//!
//! Samples are kept for the life of the process. Each provider owns its own lock, so
//! providers never contend with one another on the write path.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::warn;

/// One completed upstream attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSample {
    pub response_time_ms: f64,
    pub status_code: u16,
    pub recorded_at: DateTime<Utc>,
}

/// Response-time cutoffs for one provider. A sample at exactly a cutoff falls into the
/// faster bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub fast_ms: f64,
    pub average_ms: f64,
}

impl Thresholds {
    pub fn classify(&self, response_time_ms: f64) -> PerformanceBucket {
        if response_time_ms <= self.fast_ms {
            PerformanceBucket::Fast
        } else if response_time_ms <= self.average_ms {
            PerformanceBucket::Average
        } else {
            PerformanceBucket::Slow
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { fast_ms: 200.0, average_ms: 600.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceBucket {
    Fast,
    Average,
    Slow,
}

impl PerformanceBucket {
    pub const ALL: [PerformanceBucket; 3] =
        [PerformanceBucket::Fast, PerformanceBucket::Average, PerformanceBucket::Slow];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSummary {
    pub total_request_count: usize,
    pub average_response_time_ms: f64,
    #[serde(rename = "groupedByPerformanceDictionary")]
    pub buckets: BTreeMap<PerformanceBucket, usize>,
}

/// Process-wide sample store shared by every provider client and the stats endpoint.
#[derive(Debug, Default)]
pub struct StatsCollector {
    samples: DashMap<String, Arc<Mutex<Vec<StatSample>>>>,
    thresholds: HashMap<String, Thresholds>,
}

impl StatsCollector {
    /// `thresholds` must be keyed by the same names passed to [`StatsCollector::record`].
    pub fn new(thresholds: HashMap<String, Thresholds>) -> Self {
        Self { samples: DashMap::new(), thresholds }
    }

    pub fn record(&self, provider: &str, response_time_ms: f64, status_code: u16) {
        let sample = StatSample { response_time_ms, status_code, recorded_at: Utc::now() };

        // Clone the per-provider handle out so the map shard lock is released before pushing.
        let list = match self.samples.get(provider) {
            Some(existing) => Arc::clone(existing.value()),
            None => Arc::clone(self.samples.entry(provider.to_string()).or_default().value()),
        };

        list.lock().push(sample);
    }

    pub fn samples(&self, provider: &str) -> Vec<StatSample> {
        self.samples.get(provider).map(|list| list.lock().clone()).unwrap_or_default()
    }

    pub fn total_samples(&self) -> usize {
        self.samples.iter().map(|entry| entry.value().lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples() == 0
    }

    pub fn thresholds_for(&self, provider: &str) -> Thresholds {
        match self.thresholds.get(provider) {
            Some(thresholds) => *thresholds,
            None => {
                warn!(provider, "no latency thresholds configured, using defaults");
                Thresholds::default()
            }
        }
    }

    /// Count, mean latency and bucket histogram for every provider with at least one sample.
    pub fn summarize(&self) -> BTreeMap<String, StatSummary> {
        let mut out = BTreeMap::new();

        for entry in self.samples.iter() {
            let snapshot = entry.value().lock().clone();
            if snapshot.is_empty() {
                continue;
            }

            let thresholds = self.thresholds_for(entry.key());
            let mut buckets: BTreeMap<PerformanceBucket, usize> =
                PerformanceBucket::ALL.iter().map(|b| (*b, 0)).collect();

            let mut total_ms = 0.0;
            for sample in &snapshot {
                total_ms += sample.response_time_ms;
                *buckets.entry(thresholds.classify(sample.response_time_ms)).or_default() += 1;
            }

            out.insert(
                entry.key().clone(),
                StatSummary {
                    total_request_count: snapshot.len(),
                    average_response_time_ms: total_ms / snapshot.len() as f64,
                    buckets,
                },
            );
        }

        out
    }
}
