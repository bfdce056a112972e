//! Event latency records and summary statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event-processing latency observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub event_type: String,
    pub latency_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl LatencyRecord {
    pub fn new(event_type: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            event_type: event_type.into(),
            latency_ms,
            timestamp: Utc::now(),
        }
    }
}

/// Summary over the retained latency records of one event type.
///
/// An unknown or empty event type yields `sample_count == 0` with all
/// statistics at zero rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub event_type: String,
    pub sample_count: usize,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencyStats {
    /// The "no data" result
    pub fn empty(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            sample_count: 0,
            min: 0.0,
            max: 0.0,
            average: 0.0,
            p95: 0.0,
            p99: 0.0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }
}
