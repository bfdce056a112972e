//! Ingestion entry points for application code.
//!
//! Route handlers and listeners either wrap an operation with
//! [`Telemetry::measure`] / [`Telemetry::measure_async`], or report a
//! duration they already have with one of the direct recorders. Telemetry
//! never changes the wrapped operation's outcome.

use std::future::Future;
use std::time::{Duration, Instant};

use mintpulse_types::{keys, CategoryFields, MetricCategory, MetricSample, Tags};
use tracing::debug;

use crate::telemetry::Telemetry;

/// Convert an elapsed duration to fractional milliseconds.
pub fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1_000.0
}

/// Category fields for a measured operation, taken from caller tags.
fn fields_for(category: MetricCategory, tags: &Tags, success: bool) -> CategoryFields {
    match category {
        MetricCategory::Api => CategoryFields::Api {
            method: tags.get(keys::METHOD).map(str::to_string),
            status_code: tags.get(keys::STATUS_CODE).and_then(|code| code.parse().ok()),
        },
        MetricCategory::Event => CategoryFields::Event {
            queue_size: tags
                .get(keys::QUEUE_SIZE)
                .and_then(|size| size.parse().ok())
                .unwrap_or(0),
            event_source: tags.get(keys::EVENT_SOURCE).unwrap_or("unknown").to_string(),
        },
        MetricCategory::Blockchain => CategoryFields::Blockchain {
            network: tags.get(keys::NETWORK).unwrap_or("unknown").to_string(),
            success,
        },
    }
}

/// Records one sample for a measured operation, exactly once.
///
/// Dropping the guard without calling [`finish`](Self::finish) records a
/// failure: the operation panicked or its future was cancelled.
#[must_use = "dropping the guard immediately records a failed operation"]
pub struct MeasureGuard<'a> {
    telemetry: &'a Telemetry,
    category: MetricCategory,
    name: String,
    /// `None` once the sample has been recorded
    tags: Option<Tags>,
    started: Instant,
}

impl<'a> MeasureGuard<'a> {
    pub fn start(
        telemetry: &'a Telemetry,
        category: MetricCategory,
        name: impl Into<String>,
        tags: Tags,
    ) -> Self {
        Self {
            telemetry,
            category,
            name: name.into(),
            tags: Some(tags),
            started: Instant::now(),
        }
    }

    /// Record the outcome and consume the guard.
    pub fn finish(mut self, success: bool) {
        self.record(success, None);
    }

    fn record(&mut self, success: bool, error: Option<&str>) {
        let Some(mut tags) = self.tags.take() else {
            return;
        };
        let elapsed = duration_ms(self.started.elapsed());

        tags.insert(keys::SUCCESS, success.to_string());
        if let Some(error) = error {
            tags.insert(keys::ERROR, error);
        }
        let fields = fields_for(self.category, &tags, success);
        let sample =
            MetricSample::with_fields(fields, std::mem::take(&mut self.name), elapsed).with_tags(tags);
        self.telemetry.ingest(sample);
    }
}

impl Drop for MeasureGuard<'_> {
    fn drop(&mut self) {
        if self.tags.is_none() {
            return;
        }
        let reason = if std::thread::panicking() {
            "panicked"
        } else {
            "cancelled"
        };
        debug!(name = %self.name, reason, "Measured operation did not complete");
        self.record(false, Some(reason));
    }
}

impl Telemetry {
    /// Time `op` and record one sample tagged with its outcome.
    ///
    /// The result is returned unchanged. A panic inside `op` still records a
    /// failed sample before unwinding continues.
    pub fn measure<T, E, F>(
        &self,
        category: MetricCategory,
        name: &str,
        tags: Tags,
        op: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let guard = MeasureGuard::start(self, category, name, tags);
        let result = op();
        guard.finish(result.is_ok());
        result
    }

    /// Async counterpart of [`measure`](Self::measure).
    ///
    /// If the returned future is dropped before `fut` completes, a failed
    /// sample is recorded.
    pub async fn measure_async<T, E, F>(
        &self,
        category: MetricCategory,
        name: &str,
        tags: Tags,
        fut: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let guard = MeasureGuard::start(self, category, name, tags);
        let result = fut.await;
        guard.finish(result.is_ok());
        result
    }

    /// Record one API request. Status codes of 500 and above count as failures.
    pub fn track_api(
        &self,
        endpoint: &str,
        method: &str,
        status_code: u16,
        duration: Duration,
        tags: Tags,
    ) {
        let sample =
            MetricSample::api_request(endpoint, method, status_code, duration_ms(duration))
                .with_tags(tags);
        self.ingest(sample);
    }

    /// Record one processed event.
    pub fn record_event_metric(
        &self,
        event_type: &str,
        processing_time: Duration,
        queue_size: usize,
        event_source: &str,
        tags: Tags,
    ) {
        let sample = MetricSample::event(
            event_type,
            duration_ms(processing_time),
            queue_size,
            event_source,
        )
        .with_tags(tags);
        self.ingest(sample);
    }

    /// Record one blockchain call.
    pub fn record_blockchain_metric(
        &self,
        operation: &str,
        network: &str,
        response_time: Duration,
        success: bool,
        tags: Tags,
    ) {
        let sample =
            MetricSample::blockchain(operation, duration_ms(response_time), network, success)
                .with_tags(tags);
        self.ingest(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelemetryConfig;
    use crate::store::SampleQuery;
    use std::sync::Arc;

    fn telemetry() -> Arc<Telemetry> {
        Telemetry::new(TelemetryConfig::development()).unwrap()
    }

    fn samples(telemetry: &Telemetry, category: MetricCategory) -> Vec<Arc<MetricSample>> {
        telemetry
            .query(&SampleQuery::last(chrono::Duration::hours(1)).category(category))
            .unwrap()
    }

    #[test]
    fn test_measure_success() {
        let telemetry = telemetry();
        let result: Result<u32, String> = telemetry.measure(
            MetricCategory::Api,
            "/api/listings",
            Tags::new().with("method", "get"),
            || Ok(7),
        );
        assert_eq!(result, Ok(7));

        let recorded = samples(&telemetry, MetricCategory::Api);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].tags.get("success"), Some("true"));
        assert_eq!(recorded[0].tags.get("method"), Some("GET"));
        assert!(!recorded[0].is_failure());
    }

    #[test]
    fn test_measure_failure_passes_error_through() {
        let telemetry = telemetry();
        let result: Result<(), &str> = telemetry.measure(
            MetricCategory::Blockchain,
            "send_tx",
            Tags::new().with("network", "testnet"),
            || Err("rejected"),
        );
        assert_eq!(result, Err("rejected"));

        let recorded = samples(&telemetry, MetricCategory::Blockchain);
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].is_failure());
        assert_eq!(recorded[0].tags.get("network"), Some("testnet"));
    }

    #[test]
    fn test_measure_records_panics_once() {
        let telemetry = telemetry();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), ()> =
                telemetry.measure(MetricCategory::Api, "/boom", Tags::new(), || panic!("boom"));
        }));
        assert!(outcome.is_err());

        let recorded = samples(&telemetry, MetricCategory::Api);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].tags.get("success"), Some("false"));
        assert_eq!(recorded[0].tags.get("error"), Some("panicked"));
    }

    #[test]
    fn test_measure_event_feeds_latency() {
        let telemetry = telemetry();
        let _: Result<(), ()> = telemetry.measure(
            MetricCategory::Event,
            "mint",
            Tags::new().with("event_source", "listener"),
            || Ok(()),
        );
        assert_eq!(telemetry.latency_stats("mint").sample_count, 1);
    }

    #[test]
    fn test_measure_event_reads_queue_size_tag() {
        let telemetry = telemetry();
        let _: Result<(), ()> = telemetry.measure(
            MetricCategory::Event,
            "mint",
            Tags::new()
                .with(keys::EVENT_SOURCE, "listener")
                .with(keys::QUEUE_SIZE, "7"),
            || Ok(()),
        );

        let recorded = samples(&telemetry, MetricCategory::Event);
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].fields,
            CategoryFields::Event {
                queue_size: 7,
                event_source: "listener".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_measure_async() {
        let telemetry = telemetry();
        let result: Result<&str, ()> = telemetry
            .measure_async(MetricCategory::Api, "/api/mint", Tags::new(), async {
                tokio::task::yield_now().await;
                Ok("minted")
            })
            .await;
        assert_eq!(result, Ok("minted"));
        assert_eq!(samples(&telemetry, MetricCategory::Api).len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_future_records_failure() {
        let telemetry = telemetry();
        {
            let fut = telemetry.measure_async(
                MetricCategory::Api,
                "/api/slow",
                Tags::new(),
                std::future::pending::<Result<(), ()>>(),
            );
            let timed_out =
                tokio::time::timeout(std::time::Duration::from_millis(10), fut).await;
            assert!(timed_out.is_err());
        }

        let recorded = samples(&telemetry, MetricCategory::Api);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].tags.get("error"), Some("cancelled"));
    }

    #[test]
    fn test_track_api_status() {
        let telemetry = telemetry();
        telemetry.track_api("/api/buy", "post", 503, Duration::from_millis(120), Tags::new());
        telemetry.track_api("/api/buy", "post", 201, Duration::from_millis(80), Tags::new());

        let recorded = samples(&telemetry, MetricCategory::Api);
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded.iter().filter(|s| s.is_failure()).count(), 1);
        assert!((recorded[0].value - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_direct_recorders() {
        let telemetry = telemetry();
        telemetry.record_event_metric(
            "transfer",
            Duration::from_millis(15),
            4,
            "flow-listener",
            Tags::new().with("collection", "moments"),
        );
        telemetry.record_blockchain_metric(
            "get_account",
            "mainnet",
            Duration::from_millis(300),
            false,
            Tags::new(),
        );

        let events = samples(&telemetry, MetricCategory::Event);
        assert_eq!(events[0].dimension("event_type"), Some("transfer"));
        assert_eq!(events[0].dimension("collection"), Some("moments"));
        assert_eq!(telemetry.latency_stats("transfer").sample_count, 1);

        let calls = samples(&telemetry, MetricCategory::Blockchain);
        assert!(calls[0].is_failure());
        assert_eq!(calls[0].dimension("network"), Some("mainnet"));
    }
}
