//! Bounded, time-indexed sample storage.
//!
//! One ring buffer per category, each behind its own lock, so writers only
//! contend with writers of the same category. Readers copy `Arc` handles
//! out under a read lock and sort outside it; a query sees every sample
//! appended before its snapshot and none that are half-written.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mintpulse_types::{MetricCategory, MetricSample};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::StoreConfig;
use crate::error::{TelemetryError, TelemetryResult};
use crate::ring::RingBuffer;

/// Default cap on query results.
pub const DEFAULT_QUERY_LIMIT: usize = 1_000;

/// Range query over stored samples.
///
/// Both ends of the range are inclusive.
#[derive(Debug, Clone)]
pub struct SampleQuery {
    pub category: Option<MetricCategory>,
    pub name: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: usize,
}

impl SampleQuery {
    /// Query `[start, end]` across all categories
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            category: None,
            name: None,
            start,
            end,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }

    /// Query the trailing window ending now
    pub fn last(window: Duration) -> Self {
        let end = Utc::now();
        Self::new(end - window, end)
    }

    /// Filter by category
    pub fn category(mut self, category: MetricCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Filter by exact sample name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Cap the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Remove the result cap
    pub fn unbounded(mut self) -> Self {
        self.limit = usize::MAX;
        self
    }

    fn matches(&self, sample: &MetricSample) -> bool {
        if sample.timestamp < self.start || sample.timestamp > self.end {
            return false;
        }
        if let Some(ref name) = self.name {
            if &sample.name != name {
                return false;
            }
        }
        true
    }
}

/// Retention counters for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub category: MetricCategory,
    pub retained: usize,
    pub capacity: usize,
    /// Samples dropped by capacity or age eviction since startup
    pub evicted: u64,
}

#[derive(Debug, Clone)]
struct StoredSample {
    /// Global insertion sequence, breaks timestamp ties
    seq: u64,
    sample: Arc<MetricSample>,
}

#[derive(Debug)]
struct Partition {
    samples: RingBuffer<StoredSample>,
    evicted: u64,
}

impl Partition {
    fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
            evicted: 0,
        }
    }

    fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some(oldest) = self.samples.oldest() {
            if oldest.sample.timestamp >= cutoff {
                break;
            }
            self.samples.pop_oldest();
            removed += 1;
        }
        self.evicted += removed as u64;
        removed
    }
}

/// Append-only sample store, partitioned by category.
pub struct MetricStore {
    partitions: [RwLock<Partition>; 3],
    sequence: AtomicU64,
    max_age: Option<Duration>,
}

impl MetricStore {
    /// Create a store from configuration
    pub fn new(config: &StoreConfig) -> Self {
        let capacity = config.capacity_per_category;
        Self {
            partitions: [
                RwLock::new(Partition::new(capacity)),
                RwLock::new(Partition::new(capacity)),
                RwLock::new(Partition::new(capacity)),
            ],
            sequence: AtomicU64::new(0),
            max_age: config.max_age(),
        }
    }

    /// Create a store with a fixed capacity and no age limit
    pub fn with_capacity(capacity_per_category: usize) -> Self {
        Self::new(&StoreConfig {
            capacity_per_category,
            max_age_secs: None,
        })
    }

    fn partition(&self, category: MetricCategory) -> &RwLock<Partition> {
        &self.partitions[category.index()]
    }

    /// Append a sample to its category's partition.
    ///
    /// Never blocks beyond the partition lock and never fails: when the
    /// partition is full the oldest sample is dropped.
    pub fn record(&self, sample: MetricSample) -> Arc<MetricSample> {
        let sample = Arc::new(sample);
        let category = sample.category;
        let cutoff = self
            .max_age
            .and_then(|age| Utc::now().checked_sub_signed(age));

        let mut partition = self.partition(category).write();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        if partition
            .samples
            .push(StoredSample {
                seq,
                sample: Arc::clone(&sample),
            })
            .is_some()
        {
            partition.evicted += 1;
        }
        if let Some(cutoff) = cutoff {
            partition.evict_older_than(cutoff);
        }
        drop(partition);

        debug!(category = %category, name = %sample.name, value = sample.value, "sample recorded");
        sample
    }

    /// Samples within the query range, newest first, at most `limit`.
    ///
    /// Ordering is by timestamp, then insertion order, both descending.
    #[instrument(skip(self), fields(category = ?query.category, limit = query.limit))]
    pub fn query(&self, query: &SampleQuery) -> TelemetryResult<Vec<Arc<MetricSample>>> {
        if query.start > query.end {
            return Err(TelemetryError::InvalidRange {
                start: query.start,
                end: query.end,
            });
        }
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut matches: Vec<StoredSample> = Vec::new();
        for category in MetricCategory::ALL {
            if query.category.is_some_and(|c| c != category) {
                continue;
            }
            let partition = self.partition(category).read();
            matches.extend(
                partition
                    .samples
                    .iter()
                    .filter(|stored| query.matches(&stored.sample))
                    .cloned(),
            );
        }

        let newest_first = |a: &StoredSample, b: &StoredSample| {
            b.sample
                .timestamp
                .cmp(&a.sample.timestamp)
                .then(b.seq.cmp(&a.seq))
        };
        if matches.len() > query.limit {
            matches.select_nth_unstable_by(query.limit - 1, newest_first);
            matches.truncate(query.limit);
        }
        matches.sort_by(newest_first);

        Ok(matches.into_iter().map(|stored| stored.sample).collect())
    }

    /// Drop samples older than the configured max age.
    ///
    /// Returns the number of samples removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(age) = self.max_age else {
            return 0;
        };
        let Some(cutoff) = now.checked_sub_signed(age) else {
            return 0;
        };
        let removed: usize = self
            .partitions
            .iter()
            .map(|partition| partition.write().evict_older_than(cutoff))
            .sum();
        if removed > 0 {
            debug!(removed, "expired samples swept");
        }
        removed
    }

    /// Number of samples retained for a category
    pub fn len(&self, category: MetricCategory) -> usize {
        self.partition(category).read().samples.len()
    }

    /// Number of samples retained across all categories
    pub fn total_len(&self) -> usize {
        MetricCategory::ALL.iter().map(|c| self.len(*c)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Retention counters per category
    pub fn stats(&self) -> Vec<PartitionStats> {
        MetricCategory::ALL
            .iter()
            .map(|category| {
                let partition = self.partition(*category).read();
                PartitionStats {
                    category: *category,
                    retained: partition.samples.len(),
                    capacity: partition.samples.capacity(),
                    evicted: partition.evicted,
                }
            })
            .collect()
    }
}
