//! Grouped statistics over stored samples.
//!
//! Read-side only: samples are pulled from the store, bucketed by the value
//! of a dimension, and each bucket is summarized with a full sort. Query
//! volume is dashboard-driven, so the per-query O(n log n) is acceptable.

use std::collections::BTreeMap;
use std::sync::Arc;

use mintpulse_types::{AggregateBucket, MetricCategory, MetricSample};
use tracing::{debug, instrument};

use crate::error::TelemetryResult;
use crate::stats::Summary;
use crate::store::MetricStore;
use crate::time_range::TimeRange;

/// Bucket samples by `group_by` and summarize each bucket.
///
/// Samples without the dimension are skipped, so an unknown key yields an
/// empty result. Buckets come back sorted by group value.
pub fn aggregate_samples<'a, I>(samples: I, group_by: &str) -> Vec<AggregateBucket>
where
    I: IntoIterator<Item = &'a MetricSample>,
{
    let mut groups: BTreeMap<&'a str, (Vec<f64>, usize)> = BTreeMap::new();
    for sample in samples {
        let Some(group) = sample.dimension(group_by) else {
            continue;
        };
        let (values, failures) = groups.entry(group).or_default();
        values.push(sample.value);
        if sample.is_failure() {
            *failures += 1;
        }
    }

    groups
        .into_iter()
        .filter_map(|(group, (mut values, failures))| {
            let summary = Summary::from_values(&mut values)?;
            Some(AggregateBucket {
                group: group.to_string(),
                count: summary.count,
                average: summary.mean,
                p95: summary.p95,
                p99: summary.p99,
                min: summary.min,
                max: summary.max,
                failures,
            })
        })
        .collect()
}

/// Aggregation over a [`MetricStore`]
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<MetricStore>,
}

impl Aggregator {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self { store }
    }

    /// Group one category's samples in `range` by `group_by`.
    ///
    /// Fails only when the range is inverted.
    #[instrument(skip(self, range), fields(start = %range.start, end = %range.end))]
    pub fn aggregate(
        &self,
        category: MetricCategory,
        range: &TimeRange,
        group_by: &str,
    ) -> TelemetryResult<Vec<AggregateBucket>> {
        let samples = self.store.query(&range.to_query().category(category))?;
        let buckets = aggregate_samples(samples.iter().map(|s| &**s), group_by);
        debug!(
            samples = samples.len(),
            buckets = buckets.len(),
            "aggregation complete"
        );
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_single_group() {
        let samples = vec![
            MetricSample::api("/x", 100.0),
            MetricSample::api("/x", 200.0),
            MetricSample::api("/x", 300.0),
        ];
        let buckets = aggregate_samples(&samples, "endpoint");
        assert_eq!(buckets.len(), 1);
        let bucket = &buckets[0];
        assert_eq!(bucket.group, "/x");
        assert_eq!(bucket.count, 3);
        assert!((bucket.average - 200.0).abs() < f64::EPSILON);
        assert_eq!(bucket.p95, 300.0);
        assert_eq!(bucket.p99, 300.0);
        assert_eq!(bucket.min, 100.0);
        assert_eq!(bucket.max, 300.0);
    }

    #[test]
    fn test_multiple_groups_sorted() {
        let samples = vec![
            MetricSample::blockchain("send_tx", 10.0, "mainnet", true),
            MetricSample::blockchain("get_account", 5.0, "mainnet", false),
            MetricSample::blockchain("send_tx", 30.0, "testnet", true),
        ];
        let by_op = aggregate_samples(&samples, "operation");
        let groups: Vec<&str> = by_op.iter().map(|b| b.group.as_str()).collect();
        assert_eq!(groups, vec!["get_account", "send_tx"]);
        assert_eq!(by_op[0].failures, 1);
        assert_eq!(by_op[1].count, 2);

        let by_network = aggregate_samples(&samples, "network");
        assert_eq!(by_network.len(), 2);
    }

    #[test]
    fn test_singleton_group() {
        let samples = vec![MetricSample::event("mint", 42.0, 1, "listener")];
        let buckets = aggregate_samples(&samples, "event_type");
        assert_eq!(buckets[0].average, 42.0);
        assert_eq!(buckets[0].p95, 42.0);
        assert_eq!(buckets[0].p99, 42.0);
    }

    #[test]
    fn test_unknown_group_key_is_empty() {
        let samples = vec![MetricSample::api("/x", 1.0)];
        assert!(aggregate_samples(&samples, "file_type").is_empty());
    }

    #[test]
    fn test_samples_without_dimension_are_skipped() {
        let samples = vec![
            MetricSample::api("/upload", 1.0).with_tag("file_type", "png"),
            MetricSample::api("/upload", 2.0),
        ];
        let buckets = aggregate_samples(&samples, "file_type");
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 1);
    }

    #[test]
    fn test_aggregate_from_store() {
        let store = Arc::new(MetricStore::with_capacity(100));
        store.record(MetricSample::api("/a", 10.0));
        store.record(MetricSample::api("/b", 20.0));
        store.record(MetricSample::event("mint", 5.0, 0, "l"));

        let aggregator = Aggregator::new(Arc::clone(&store));
        let buckets = aggregator
            .aggregate(
                MetricCategory::Api,
                &TimeRange::last(Duration::minutes(5)),
                "endpoint",
            )
            .unwrap();
        assert_eq!(buckets.len(), 2);

        let now = Utc::now();
        let inverted = TimeRange::new(now, now - Duration::minutes(1));
        assert!(aggregator
            .aggregate(MetricCategory::Api, &inverted, "endpoint")
            .is_err());
    }
}
