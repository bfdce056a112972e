//! Error types for the telemetry engine.
//!
//! Only query-path and configuration failures are surfaced. Store pressure
//! never produces an error: the oldest data is evicted silently.

use chrono::{DateTime, Utc};
use mintpulse_types::{AlertId, RuleId};
use thiserror::Error;

/// Errors returned by telemetry queries and configuration.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Query range start is after its end.
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// No alert with this id exists.
    #[error("alert not found: {0}")]
    NotFound(AlertId),

    /// Alert rule failed validation.
    #[error("invalid alert rule {rule_id}: {reason}")]
    InvalidRule { rule_id: RuleId, reason: String },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized.
    #[error("logging initialization failed: {0}")]
    Logging(String),

    /// A background task was requested outside a Tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

impl From<config::ConfigError> for TelemetryError {
    fn from(e: config::ConfigError) -> Self {
        TelemetryError::Config(e.to_string())
    }
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
