//! Property tests: storage, aggregation and ring-buffer invariants hold for
//! arbitrary inputs.

use chrono::{Duration, Utc};
use mintpulse_engine::{aggregate_samples, EventLatencyMonitor, MetricStore, SampleQuery};
use mintpulse_types::{MetricCategory, MetricSample};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Ages in seconds relative to a fixed reference time.
fn arb_ages() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..3_600, 0..200)
}

fn arb_latency() -> impl Strategy<Value = f64> {
    0.0f64..10_000.0
}

fn arb_endpoint() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("/api/mint".to_string()),
        Just("/api/buy".to_string()),
        Just("/api/listings".to_string()),
    ]
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A range query returns exactly the in-range samples, newest first, capped at `limit`.
    #[test]
    fn query_returns_in_range_subset_newest_first(
        ages in arb_ages(),
        lo in 0i64..3_600,
        span in 0i64..3_600,
        limit in 1usize..250,
    ) {
        let store = MetricStore::with_capacity(1_000);
        let reference = Utc::now();
        for (i, age) in ages.iter().enumerate() {
            store.record(
                MetricSample::api("/x", i as f64).at(reference - Duration::seconds(*age)),
            );
        }

        let start = reference - Duration::seconds(lo + span);
        let end = reference - Duration::seconds(lo);
        let expected = ages.iter().filter(|age| **age >= lo && **age <= lo + span).count();

        let results = store
            .query(&SampleQuery::new(start, end).category(MetricCategory::Api).limit(limit))
            .unwrap();

        prop_assert_eq!(results.len(), expected.min(limit));
        for sample in &results {
            prop_assert!(sample.timestamp >= start && sample.timestamp <= end);
        }
        for pair in results.windows(2) {
            prop_assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    /// Every bucket counts its whole group and keeps p95 <= p99.
    #[test]
    fn aggregate_buckets_are_consistent(
        samples in prop::collection::vec((arb_endpoint(), arb_latency()), 1..150),
    ) {
        let samples: Vec<MetricSample> = samples
            .into_iter()
            .map(|(endpoint, value)| MetricSample::api(endpoint, value))
            .collect();
        let buckets = aggregate_samples(&samples, "endpoint");

        let total: usize = buckets.iter().map(|b| b.count).sum();
        prop_assert_eq!(total, samples.len());

        for bucket in &buckets {
            let group_size = samples.iter().filter(|s| s.name == bucket.group).count();
            prop_assert_eq!(bucket.count, group_size);
            prop_assert!(bucket.count > 0);
            prop_assert!(bucket.p95 <= bucket.p99);
            prop_assert!(bucket.min <= bucket.average + 1e-9);
            prop_assert!(bucket.average <= bucket.max + 1e-9);
            if bucket.count == 1 {
                prop_assert_eq!(bucket.average, bucket.p95);
                prop_assert_eq!(bucket.p95, bucket.p99);
            }
        }
    }

    /// Exceeding the cap by `k` leaves exactly the most recent `cap` samples.
    #[test]
    fn store_eviction_is_fifo(capacity in 1usize..64, overflow in 0usize..64) {
        let store = MetricStore::with_capacity(capacity);
        let total = capacity + overflow;
        for i in 0..total {
            store.record(MetricSample::event("mint", i as f64, 0, "listener"));
        }

        let retained = store
            .query(&SampleQuery::last(Duration::hours(1)).unbounded())
            .unwrap();
        let mut values: Vec<f64> = retained.iter().map(|s| s.value).collect();
        values.sort_by(f64::total_cmp);

        let expected: Vec<f64> = (overflow..total).map(|i| i as f64).collect();
        prop_assert_eq!(values, expected);
        prop_assert_eq!(store.stats()[MetricCategory::Event.index()].evicted, overflow as u64);
    }

    /// After `capacity + n` records, the recent view is exactly the last `capacity`.
    #[test]
    fn latency_ring_keeps_last_capacity(capacity in 1usize..128, extra in 0usize..128) {
        let monitor = EventLatencyMonitor::with_capacity(capacity);
        let total = capacity + extra;
        for i in 0..total {
            monitor.record("mint", i as f64);
        }

        let recent: Vec<f64> = monitor
            .get_recent_latency(Some("mint"), capacity)
            .iter()
            .map(|r| r.latency_ms)
            .collect();
        let expected: Vec<f64> = (extra..total).rev().map(|i| i as f64).collect();
        prop_assert_eq!(recent, expected);
        prop_assert_eq!(monitor.get_latency_stats("mint").sample_count, capacity);
    }
}
