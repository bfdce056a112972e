//! The telemetry service.
//!
//! One [`Telemetry`] instance is built at startup and shared as
//! `Arc<Telemetry>` with every request handler and listener that reports
//! metrics. It routes each sample to the store, the latency monitor and the
//! alert manager, and serves the dashboard queries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use mintpulse_types::{
    AggregateBucket, Alert, AlertFilter, AlertId, AlertRule, LatencyRecord, LatencyStats,
    MetricCategory, MetricSample, RuleId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::alerts::{AlertEvent, AlertManager};
use crate::config::TelemetryConfig;
use crate::error::{TelemetryError, TelemetryResult};
use crate::latency::EventLatencyMonitor;
use crate::store::{MetricStore, PartitionStats, SampleQuery};
use crate::time_range::TimeRange;

/// Dashboard snapshot over a time range.
///
/// Sections are computed independently. A section that fails is left empty
/// and its error is listed in `warnings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub range: TimeRange,
    /// API timings grouped by endpoint
    pub api: Vec<AggregateBucket>,
    /// Event processing grouped by event type
    pub events: Vec<AggregateBucket>,
    /// Blockchain calls grouped by operation
    pub blockchain: Vec<AggregateBucket>,
    pub active_alerts: Vec<Alert>,
    pub latency: Vec<LatencyStats>,
    pub store: Vec<PartitionStats>,
    /// Samples accepted since startup
    pub ingested: u64,
    pub warnings: Vec<String>,
}

impl PerformanceReport {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Outcome of one eviction sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_samples: usize,
    pub pruned_alerts: usize,
}

struct SweepHandle {
    task: JoinHandle<()>,
    stop: mpsc::Sender<()>,
}

/// Telemetry ingestion and query service.
pub struct Telemetry {
    config: TelemetryConfig,
    store: Arc<MetricStore>,
    aggregator: Aggregator,
    alerts: AlertManager,
    latency: EventLatencyMonitor,
    accepting: AtomicBool,
    ingested: AtomicU64,
    sweep: Mutex<Option<SweepHandle>>,
}

impl Telemetry {
    /// Build the service from validated configuration.
    pub fn new(config: TelemetryConfig) -> TelemetryResult<Arc<Self>> {
        config.validate()?;

        let store = Arc::new(MetricStore::new(&config.store));
        let telemetry = Self {
            aggregator: Aggregator::new(Arc::clone(&store)),
            alerts: AlertManager::new(&config.alerts)?,
            latency: EventLatencyMonitor::new(&config.latency),
            store,
            accepting: AtomicBool::new(true),
            ingested: AtomicU64::new(0),
            sweep: Mutex::new(None),
            config,
        };

        info!(
            capacity_per_category = telemetry.config.store.capacity_per_category,
            capacity_per_event_type = telemetry.config.latency.capacity_per_event_type,
            rules = telemetry.alerts.rules().len(),
            "Telemetry service created"
        );
        Ok(Arc::new(telemetry))
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Whether ingestion is still accepted.
    pub fn is_running(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Samples accepted since startup.
    pub fn ingested(&self) -> u64 {
        self.ingested.load(Ordering::Relaxed)
    }

    // ---------------------------------------------------------------------
    // Ingestion
    // ---------------------------------------------------------------------

    /// Accept one sample.
    ///
    /// Stores it, mirrors event samples into the latency monitor and runs
    /// alert evaluation. Never fails; after [`shutdown`](Self::shutdown), or
    /// when the value is NaN or infinite, the sample is dropped and `None` is
    /// returned.
    pub fn ingest(&self, sample: MetricSample) -> Option<Arc<MetricSample>> {
        if !self.is_running() {
            debug!(category = %sample.category, name = %sample.name, "Telemetry stopped, sample dropped");
            return None;
        }
        if !sample.value.is_finite() {
            debug!(
                category = %sample.category,
                name = %sample.name,
                value = sample.value,
                "Non-finite sample dropped"
            );
            return None;
        }

        let stored = self.store.record(sample);
        if stored.category == MetricCategory::Event {
            self.latency.record(&stored.name, stored.value);
        }
        self.alerts.evaluate(&stored);
        self.ingested.fetch_add(1, Ordering::Relaxed);
        Some(stored)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Samples matching `query`, newest first.
    pub fn query(&self, query: &SampleQuery) -> TelemetryResult<Vec<Arc<MetricSample>>> {
        self.store.query(query)
    }

    /// Grouped statistics for one category.
    pub fn aggregate(
        &self,
        category: MetricCategory,
        range: &TimeRange,
        group_by: &str,
    ) -> TelemetryResult<Vec<AggregateBucket>> {
        self.aggregator.aggregate(category, range, group_by)
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.get_active_alerts()
    }

    pub fn alerts(&self, filter: AlertFilter) -> Vec<Alert> {
        self.alerts.get_alerts(filter)
    }

    pub fn resolve_alert(&self, id: AlertId) -> TelemetryResult<()> {
        self.alerts.resolve_alert(id)
    }

    pub fn register_rule(&self, rule: AlertRule) -> TelemetryResult<()> {
        self.alerts.register_rule(rule)
    }

    pub fn remove_rule(&self, rule_id: &RuleId) -> bool {
        self.alerts.remove_rule(rule_id)
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alerts.subscribe()
    }

    pub fn latency_stats(&self, event_type: &str) -> LatencyStats {
        self.latency.get_latency_stats(event_type)
    }

    pub fn recent_latency(&self, event_type: Option<&str>, limit: usize) -> Vec<LatencyRecord> {
        self.latency.get_recent_latency(event_type, limit)
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    pub fn alert_manager(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn latency_monitor(&self) -> &EventLatencyMonitor {
        &self.latency
    }

    /// Build the dashboard snapshot for `range`.
    #[instrument(skip(self, range), fields(start = %range.start, end = %range.end))]
    pub fn performance_report(&self, range: &TimeRange) -> PerformanceReport {
        let mut warnings = Vec::new();
        let mut section = |category: MetricCategory| {
            match self.aggregate(category, range, category.name_key()) {
                Ok(buckets) => buckets,
                Err(e) => {
                    warn!(category = %category, error = %e, "Report section failed");
                    warnings.push(format!("{}: {}", category, e));
                    Vec::new()
                }
            }
        };

        let api = section(MetricCategory::Api);
        let events = section(MetricCategory::Event);
        let blockchain = section(MetricCategory::Blockchain);

        PerformanceReport {
            generated_at: Utc::now(),
            range: *range,
            api,
            events,
            blockchain,
            active_alerts: self.active_alerts(),
            latency: self.latency.all_stats(),
            store: self.store.stats(),
            ingested: self.ingested(),
            warnings,
        }
    }

    /// Dashboard snapshot over a trailing range string such as `"24h"`.
    ///
    /// Malformed input falls back to the last hour.
    pub fn performance_report_for(&self, range: Option<&str>) -> PerformanceReport {
        self.performance_report(&TimeRange::last_from_str(range))
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Run one eviction pass: expired samples and stale resolved alerts.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        SweepReport {
            expired_samples: self.store.sweep_expired(now),
            pruned_alerts: self.alerts.prune_resolved(now),
        }
    }

    /// Start the periodic eviction sweep if enabled in configuration.
    ///
    /// Returns `Ok(false)` when the sweep is disabled or already running.
    /// Must be called from within a Tokio runtime.
    pub fn start_sweep(self: &Arc<Self>) -> TelemetryResult<bool> {
        if !self.config.sweep.enabled || !self.is_running() {
            return Ok(false);
        }

        let mut slot = self.sweep.lock();
        if slot.is_some() {
            return Ok(false);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TelemetryError::NoRuntime(e.to_string()))?;

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let period = self.config.sweep.interval();
        let weak: Weak<Self> = Arc::downgrade(self);

        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(telemetry) = weak.upgrade() else {
                            break;
                        };
                        let report = telemetry.sweep_once(Utc::now());
                        if report != SweepReport::default() {
                            debug!(
                                expired_samples = report.expired_samples,
                                pruned_alerts = report.pruned_alerts,
                                "Eviction sweep"
                            );
                        }
                    }
                    _ = stop_rx.recv() => {
                        debug!("Eviction sweep stopped");
                        break;
                    }
                }
            }
        });

        *slot = Some(SweepHandle {
            task,
            stop: stop_tx,
        });
        info!(interval_secs = period.as_secs(), "Eviction sweep started");
        Ok(true)
    }

    /// Whether the periodic sweep is running.
    pub fn sweep_running(&self) -> bool {
        self.sweep
            .lock()
            .as_ref()
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }

    /// Stop accepting samples and stop the sweep.
    ///
    /// Queries keep working on the retained data. Calling this twice is a
    /// no-op.
    pub fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(handle) = self.sweep.lock().as_ref() {
            if let Err(e) = handle.stop.try_send(()) {
                error!(error = %e, "Failed to signal eviction sweep");
            }
        }

        info!(
            ingested = self.ingested(),
            retained = self.store.total_len(),
            active_alerts = self.alerts.get_active_alerts().len(),
            latency_records = self.latency.total_records(),
            "Telemetry service shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepConfig;
    use chrono::Duration;

    fn telemetry() -> Arc<Telemetry> {
        Telemetry::new(TelemetryConfig::development()).unwrap()
    }

    #[test]
    fn test_ingest_routes_event_samples_to_latency() {
        let telemetry = telemetry();
        telemetry.ingest(MetricSample::event("mint", 12.0, 3, "listener"));
        telemetry.ingest(MetricSample::api("/api/mint", 40.0));

        assert_eq!(telemetry.latency_stats("mint").sample_count, 1);
        assert_eq!(telemetry.store().total_len(), 2);
        assert_eq!(telemetry.ingested(), 2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = TelemetryConfig::development();
        config.store.capacity_per_category = 0;
        assert!(matches!(
            Telemetry::new(config),
            Err(TelemetryError::Config(_))
        ));
    }

    #[test]
    fn test_configured_rules_are_registered() {
        let mut config = TelemetryConfig::development();
        config.alerts.rules.push(
            AlertRule::builder("slow-blockchain")
                .category(MetricCategory::Blockchain)
                .dimension("operation")
                .above(1_000.0)
                .build(),
        );
        let telemetry = Telemetry::new(config).unwrap();

        telemetry.ingest(MetricSample::blockchain("send_tx", 2_500.0, "mainnet", true));
        assert_eq!(telemetry.active_alerts().len(), 1);
    }

    #[test]
    fn test_report_groups_each_category() {
        let telemetry = telemetry();
        telemetry.ingest(MetricSample::api("/a", 10.0));
        telemetry.ingest(MetricSample::api("/b", 20.0));
        telemetry.ingest(MetricSample::event("mint", 5.0, 0, "listener"));
        telemetry.ingest(MetricSample::blockchain("send_tx", 7.0, "testnet", false));

        let report = telemetry.performance_report_for(Some("1h"));
        assert!(!report.is_partial());
        assert_eq!(report.api.len(), 2);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.blockchain[0].failures, 1);
        assert_eq!(report.latency.len(), 1);
        assert_eq!(report.ingested, 4);
    }

    #[test]
    fn test_report_on_inverted_range_is_partial() {
        let telemetry = telemetry();
        telemetry.ingest(MetricSample::event("mint", 5.0, 0, "listener"));

        let now = Utc::now();
        let report = telemetry.performance_report(&TimeRange::new(now, now - Duration::hours(1)));
        assert!(report.is_partial());
        assert_eq!(report.warnings.len(), 3);
        assert!(report.api.is_empty());
        // sections not tied to the range still render
        assert_eq!(report.latency.len(), 1);
    }

    #[test]
    fn test_non_finite_samples_are_dropped() {
        let mut config = TelemetryConfig::development();
        config.alerts.rules.push(
            AlertRule::builder("slow")
                .dimension("event_type")
                .above(250.0)
                .average_over(3)
                .build(),
        );
        let telemetry = Telemetry::new(config).unwrap();

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(telemetry
                .ingest(MetricSample::event("mint", value, 0, "listener"))
                .is_none());
        }
        assert!(telemetry.store().is_empty());
        assert_eq!(telemetry.latency_stats("mint").sample_count, 0);
        assert_eq!(telemetry.ingested(), 0);

        telemetry.ingest(MetricSample::event("mint", 900.0, 0, "listener"));
        assert_eq!(telemetry.active_alerts().len(), 1);
    }

    #[test]
    fn test_shutdown_stops_ingestion() {
        let telemetry = telemetry();
        telemetry.ingest(MetricSample::api("/a", 10.0));
        telemetry.shutdown();
        telemetry.shutdown();

        assert!(!telemetry.is_running());
        assert!(telemetry.ingest(MetricSample::api("/a", 10.0)).is_none());
        let samples = telemetry.query(&SampleQuery::last(Duration::hours(1))).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_sweep_once_expires_old_samples() {
        let mut config = TelemetryConfig::development();
        config.store.max_age_secs = Some(60);
        let telemetry = Telemetry::new(config).unwrap();
        telemetry.ingest(MetricSample::api("/a", 1.0));
        telemetry.ingest(MetricSample::api("/b", 1.0));

        assert_eq!(telemetry.sweep_once(Utc::now()).expired_samples, 0);
        let report = telemetry.sweep_once(Utc::now() + Duration::minutes(2));
        assert_eq!(report.expired_samples, 2);
        assert!(telemetry.store().is_empty());
    }

    #[test]
    fn test_sweep_requires_runtime() {
        let mut config = TelemetryConfig::development();
        config.sweep = SweepConfig {
            enabled: true,
            interval_secs: 1,
        };
        let telemetry = Telemetry::new(config).unwrap();
        assert!(matches!(
            telemetry.start_sweep(),
            Err(TelemetryError::NoRuntime(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_disabled_by_default() {
        let telemetry = telemetry();
        assert!(!telemetry.start_sweep().unwrap());
        assert!(!telemetry.sweep_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_and_stops() {
        let mut config = TelemetryConfig::development();
        config.sweep = SweepConfig {
            enabled: true,
            interval_secs: 1,
        };
        let telemetry = Telemetry::new(config).unwrap();

        assert!(telemetry.start_sweep().unwrap());
        assert!(!telemetry.start_sweep().unwrap());
        assert!(telemetry.sweep_running());

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(telemetry.sweep_running());

        telemetry.shutdown();
        for _ in 0..10 {
            if !telemetry.sweep_running() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!telemetry.sweep_running());
        // a stopped service does not restart the sweep
        assert!(!telemetry.start_sweep().unwrap());
    }
}
