//! Alerts raised by threshold rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::rule::RuleId;

/// Unique identifier for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert:{}", self.0)
    }
}

/// Alert severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    #[default]
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A threshold breach for one (rule, dimension) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,

    /// Rule that raised the alert
    pub rule_id: RuleId,

    /// Dimension value the rule was evaluated for (e.g. an endpoint)
    pub dimension: String,

    pub severity: AlertSeverity,

    pub message: String,

    /// Threshold of the rule at the time the alert was raised
    pub threshold: f64,

    /// Observed value of the most recent breaching sample
    pub last_value: f64,

    /// Number of breaching samples folded into this alert
    pub occurrences: u64,

    pub first_triggered_at: DateTime<Utc>,

    pub last_triggered_at: DateTime<Utc>,

    pub resolved: bool,

    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Create a new unresolved alert
    pub fn new(
        rule_id: RuleId,
        dimension: impl Into<String>,
        severity: AlertSeverity,
        message: impl Into<String>,
        threshold: f64,
        value: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::generate(),
            rule_id,
            dimension: dimension.into(),
            severity,
            message: message.into(),
            threshold,
            last_value: value,
            occurrences: 1,
            first_triggered_at: now,
            last_triggered_at: now,
            resolved: false,
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.resolved
    }

    /// Fold another breaching observation into this alert
    pub fn record_occurrence(&mut self, value: f64, now: DateTime<Utc>) {
        self.occurrences += 1;
        self.last_value = value;
        self.last_triggered_at = now;
    }

    /// Mark the alert resolved. Returns false if it already was.
    pub fn resolve(&mut self, now: DateTime<Utc>) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        self.resolved_at = Some(now);
        true
    }
}

/// Which alerts a listing should include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFilter {
    #[default]
    All,
    Active,
    Resolved,
}

impl AlertFilter {
    pub fn includes(self, alert: &Alert) -> bool {
        match self {
            Self::All => true,
            Self::Active => !alert.resolved,
            Self::Resolved => alert.resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> Alert {
        Alert::new(
            RuleId::new("slow"),
            "/x",
            AlertSeverity::Warning,
            "too slow",
            250.0,
            260.0,
            Utc::now(),
        )
    }

    #[test]
    fn test_alert_ids_unique() {
        assert_ne!(AlertId::generate(), AlertId::generate());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut alert = alert();
        let first = Utc::now();
        assert!(alert.resolve(first));
        assert!(!alert.resolve(Utc::now()));
        assert!(alert.resolved);
        assert_eq!(alert.resolved_at, Some(first));
    }

    #[test]
    fn test_record_occurrence() {
        let mut alert = alert();
        alert.record_occurrence(270.0, Utc::now());
        assert_eq!(alert.occurrences, 2);
        assert_eq!(alert.last_value, 270.0);
        assert!(alert.last_triggered_at >= alert.first_triggered_at);
    }

    #[test]
    fn test_filter() {
        let mut alert = alert();
        assert!(AlertFilter::Active.includes(&alert));
        assert!(!AlertFilter::Resolved.includes(&alert));
        alert.resolve(Utc::now());
        assert!(AlertFilter::Resolved.includes(&alert));
        assert!(AlertFilter::All.includes(&alert));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::Warning);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);
    }
}
