//! Threshold alerting on the ingestion path.
//!
//! Every ingested sample is checked against each registered rule that
//! matches its category and name. Per (rule, dimension value) the manager
//! keeps a small window of recent values and at most one unresolved alert:
//!
//! ```text
//!   Normal ──breach (min_samples met)──► Breaching ──resolve_alert──► Resolved
//!                                            │  ▲
//!                                            └──┘ further breaches fold into
//!                                                 the existing alert
//! ```
//!
//! Evaluation costs O(number of rules) per sample and never sorts or blocks
//! on I/O. Alerts are only resolved explicitly.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mintpulse_types::{
    Alert, AlertFilter, AlertId, AlertRule, MetricSample, RuleId, RuleStatistic,
};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::AlertConfig;
use crate::error::{TelemetryError, TelemetryResult};

/// Events emitted by the alert manager.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    /// A new alert was raised.
    Raised(Alert),

    /// An alert was resolved by an operator.
    Resolved(Alert),
}

/// Deduplication key: rule id plus dimension value.
type DedupKey = (RuleId, String);

/// Recent values for one (rule, dimension) pair.
#[derive(Debug)]
struct DimensionWindow {
    seen: usize,
    recent: VecDeque<f64>,
    last_seen: DateTime<Utc>,
}

impl DimensionWindow {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            seen: 0,
            recent: VecDeque::new(),
            last_seen: now,
        }
    }

    /// Fold in a finite value and return the statistic the rule compares.
    fn observe(&mut self, value: f64, statistic: RuleStatistic, now: DateTime<Utc>) -> f64 {
        self.seen = self.seen.saturating_add(1);
        self.last_seen = now;
        match statistic {
            RuleStatistic::Sample => value,
            RuleStatistic::Average { window } => {
                self.recent.push_back(value);
                while self.recent.len() > window.max(1) {
                    self.recent.pop_front();
                }
                // summed fresh over the bounded window so no error carries over
                let sum: f64 = self.recent.iter().sum();
                sum / self.recent.len() as f64
            }
        }
    }
}

/// Rule registry and alert state.
pub struct AlertManager {
    /// Registered rules, in registration order.
    rules: RwLock<Vec<AlertRule>>,

    /// Per (rule, dimension) evaluation windows.
    windows: DashMap<DedupKey, DimensionWindow>,

    /// Unresolved alert for each (rule, dimension).
    active: DashMap<DedupKey, AlertId>,

    /// All retained alerts.
    alerts: DashMap<AlertId, Alert>,

    /// Event broadcaster.
    event_tx: broadcast::Sender<AlertEvent>,

    /// Resolved alerts older than this are pruned.
    resolved_retention: Duration,

    /// Upper bound on retained alerts.
    max_alerts: usize,

    /// Windows without samples for this long are dropped on prune.
    window_idle: Duration,
}

impl AlertManager {
    /// Create a manager and register the configured rules.
    pub fn new(config: &AlertConfig) -> TelemetryResult<Self> {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let manager = Self {
            rules: RwLock::new(Vec::new()),
            windows: DashMap::new(),
            active: DashMap::new(),
            alerts: DashMap::new(),
            event_tx,
            resolved_retention: config.resolved_retention(),
            max_alerts: config.max_alerts.max(1),
            window_idle: config.window_idle(),
        };
        for rule in &config.rules {
            manager.register_rule(rule.clone())?;
        }
        Ok(manager)
    }

    /// Subscribe to alert events.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.event_tx.subscribe()
    }

    /// Register a rule, replacing any rule with the same id.
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn register_rule(&self, rule: AlertRule) -> TelemetryResult<()> {
        rule.validate().map_err(|reason| TelemetryError::InvalidRule {
            rule_id: rule.id.clone(),
            reason,
        })?;

        let mut rules = self.rules.write();
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => {
                self.windows.retain(|key, _| key.0 != rule.id);
                *existing = rule;
                info!("Replaced alert rule");
            }
            None => {
                rules.push(rule);
                info!("Registered alert rule");
            }
        }
        Ok(())
    }

    /// Remove a rule. Its unresolved alerts stay until resolved.
    pub fn remove_rule(&self, rule_id: &RuleId) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| &r.id != rule_id);
        let removed = rules.len() != before;
        drop(rules);

        if removed {
            self.windows.retain(|key, _| &key.0 != rule_id);
            info!(rule_id = %rule_id, "Removed alert rule");
        }
        removed
    }

    /// Currently registered rules.
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.read().clone()
    }

    /// Check a freshly ingested sample against every matching rule.
    ///
    /// Returns the ids of alerts raised by this sample. Samples with a
    /// non-finite value are ignored.
    pub fn evaluate(&self, sample: &MetricSample) -> Vec<AlertId> {
        if !sample.value.is_finite() {
            debug!(name = %sample.name, value = sample.value, "Non-finite sample skipped by alerting");
            return Vec::new();
        }
        let now = Utc::now();
        let mut raised = Vec::new();

        {
            let rules = self.rules.read();
            for rule in rules.iter().filter(|rule| rule.matches(sample)) {
                let Some(dimension) = sample.dimension(&rule.dimension) else {
                    continue;
                };
                let key: DedupKey = (rule.id.clone(), dimension.to_string());

                let (seen, observed) = {
                    let mut window = self
                        .windows
                        .entry(key.clone())
                        .or_insert_with(|| DimensionWindow::new(now));
                    let observed = window.observe(sample.value, rule.statistic, now);
                    (window.seen, observed)
                };

                if seen < rule.min_samples || !rule.comparator.breaches(observed, rule.threshold) {
                    continue;
                }

                if let Some(alert) = self.raise_or_fold(rule, key, observed, now) {
                    raised.push(alert);
                }
            }
        }

        if raised.is_empty() {
            return Vec::new();
        }

        let ids = raised.iter().map(|alert| alert.id).collect();
        for alert in raised {
            warn!(
                alert_id = %alert.id,
                rule_id = %alert.rule_id,
                dimension = %alert.dimension,
                severity = %alert.severity,
                value = alert.last_value,
                "Alert raised"
            );
            let _ = self.event_tx.send(AlertEvent::Raised(alert));
        }
        ids
    }

    /// Create an alert for `key`, or fold the breach into the active one.
    fn raise_or_fold(
        &self,
        rule: &AlertRule,
        key: DedupKey,
        observed: f64,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        match self.active.entry(key) {
            Entry::Occupied(mut entry) => {
                let id = *entry.get();
                if let Some(mut alert) = self.alerts.get_mut(&id) {
                    if alert.is_active() {
                        alert.record_occurrence(observed, now);
                        debug!(alert_id = %id, occurrences = alert.occurrences, "Breach folded into active alert");
                        return None;
                    }
                }
                // mapping outlived its alert (resolved or pruned concurrently)
                let alert = Self::build_alert(rule, &entry.key().1, observed, now);
                self.alerts.insert(alert.id, alert.clone());
                entry.insert(alert.id);
                Some(alert)
            }
            Entry::Vacant(entry) => {
                let alert = Self::build_alert(rule, &entry.key().1, observed, now);
                self.alerts.insert(alert.id, alert.clone());
                entry.insert(alert.id);
                Some(alert)
            }
        }
    }

    fn build_alert(rule: &AlertRule, dimension: &str, observed: f64, now: DateTime<Utc>) -> Alert {
        let message = format!(
            "{}: {} on {}={} (observed {:.2})",
            rule.id,
            rule.describe(),
            rule.dimension,
            dimension,
            observed
        );
        Alert::new(
            rule.id.clone(),
            dimension,
            rule.severity,
            message,
            rule.threshold,
            observed,
            now,
        )
    }

    /// Resolve an alert by id.
    ///
    /// Resolving an already-resolved alert is a no-op. The dimension's
    /// evaluation window is reset, so a new alert needs `min_samples` fresh
    /// samples.
    #[instrument(skip(self))]
    pub fn resolve_alert(&self, id: AlertId) -> TelemetryResult<()> {
        let (key, resolved) = {
            let mut alert = self
                .alerts
                .get_mut(&id)
                .ok_or(TelemetryError::NotFound(id))?;
            let newly_resolved = alert.resolve(Utc::now());
            let key: DedupKey = (alert.rule_id.clone(), alert.dimension.clone());
            (key, newly_resolved.then(|| alert.clone()))
        };

        let Some(alert) = resolved else {
            debug!(alert_id = %id, "Alert already resolved");
            return Ok(());
        };

        self.active.remove_if(&key, |_, active_id| *active_id == id);
        self.windows.remove(&key);
        info!(alert_id = %id, rule_id = %alert.rule_id, dimension = %alert.dimension, "Alert resolved");
        let _ = self.event_tx.send(AlertEvent::Resolved(alert));
        Ok(())
    }

    /// Look up one alert.
    pub fn get_alert(&self, id: &AlertId) -> Option<Alert> {
        self.alerts.get(id).map(|alert| alert.clone())
    }

    /// All unresolved alerts, newest first.
    pub fn get_active_alerts(&self) -> Vec<Alert> {
        self.get_alerts(AlertFilter::Active)
    }

    /// Alerts matching a filter, newest first.
    pub fn get_alerts(&self, filter: AlertFilter) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| filter.includes(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        alerts.sort_by(|a, b| {
            b.first_triggered_at
                .cmp(&a.first_triggered_at)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        alerts
    }

    /// Number of retained alerts (active and resolved).
    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    /// Drop resolved alerts past retention, trim to the size bound and
    /// evict idle evaluation windows.
    ///
    /// Active alerts are never pruned. Returns the number of alerts removed.
    /// Runs off the ingestion path (sweep or operator call).
    pub fn prune_resolved(&self, now: DateTime<Utc>) -> usize {
        let expired = match now.checked_sub_signed(self.resolved_retention) {
            Some(cutoff) => {
                let before = self.alerts.len();
                self.alerts.retain(|_, alert| match alert.resolved_at {
                    Some(resolved_at) if alert.resolved => resolved_at >= cutoff,
                    _ => true,
                });
                before.saturating_sub(self.alerts.len())
            }
            None => 0,
        };
        let trimmed = self.enforce_capacity();
        let idle = self.evict_idle_windows(now);
        if expired + trimmed + idle > 0 {
            debug!(expired, trimmed, idle_windows = idle, "Pruned alert state");
        }
        expired + trimmed
    }

    /// Drop evaluation windows with no samples since `now - window_idle`.
    ///
    /// Windows backing an active alert are kept. Returns the number evicted.
    pub fn evict_idle_windows(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.window_idle) else {
            return 0;
        };
        let before = self.windows.len();
        self.windows
            .retain(|key, window| window.last_seen >= cutoff || self.active.contains_key(key));
        before.saturating_sub(self.windows.len())
    }

    /// Number of (rule, dimension) pairs with evaluation state.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Remove the oldest resolved alerts while over `max_alerts`.
    fn enforce_capacity(&self) -> usize {
        let len = self.alerts.len();
        if len <= self.max_alerts {
            return 0;
        }

        let mut resolved: Vec<(DateTime<Utc>, AlertId)> = self
            .alerts
            .iter()
            .filter_map(|entry| {
                let alert = entry.value();
                alert
                    .resolved_at
                    .filter(|_| alert.resolved)
                    .map(|at| (at, alert.id))
            })
            .collect();
        resolved.sort_by(|a, b| a.0.cmp(&b.0));

        let excess = len - self.max_alerts;
        let mut removed = 0;
        for (_, id) in resolved.into_iter().take(excess) {
            if self.alerts.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }
}
