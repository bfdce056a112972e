//! Configuration for the telemetry engine
//!
//! Capacities and retention windows are tunables; defaults suit a single
//! marketplace instance.

use mintpulse_types::AlertRule;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TelemetryError, TelemetryResult};

/// Top-level telemetry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Sample store retention
    #[serde(default)]
    pub store: StoreConfig,

    /// Event latency ring buffers
    #[serde(default)]
    pub latency: LatencyConfig,

    /// Alert rules and retention
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Periodic eviction sweep
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sample store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum samples retained per category
    #[serde(default = "default_category_capacity")]
    pub capacity_per_category: usize,

    /// Samples older than this are evicted; `None` keeps them until capacity pushes them out
    #[serde(default = "default_max_age")]
    pub max_age_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity_per_category: default_category_capacity(),
            max_age_secs: default_max_age(),
        }
    }
}

impl StoreConfig {
    pub fn max_age(&self) -> Option<chrono::Duration> {
        self.max_age_secs.map(secs_to_duration)
    }
}

/// Event latency monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Ring buffer capacity for each event type
    #[serde(default = "default_event_capacity")]
    pub capacity_per_event_type: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            capacity_per_event_type: default_event_capacity(),
        }
    }
}

/// Alert manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Rules registered at startup
    #[serde(default)]
    pub rules: Vec<AlertRule>,

    /// Resolved alerts older than this are pruned
    #[serde(default = "default_resolved_retention")]
    pub resolved_retention_secs: u64,

    /// Upper bound on retained alerts; oldest resolved alerts go first
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,

    /// Buffer size of the alert event broadcast channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Evaluation state for a (rule, dimension) unseen this long is dropped
    #[serde(default = "default_window_idle")]
    pub window_idle_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            resolved_retention_secs: default_resolved_retention(),
            max_alerts: default_max_alerts(),
            event_channel_capacity: default_event_channel_capacity(),
            window_idle_secs: default_window_idle(),
        }
    }
}

impl AlertConfig {
    pub fn resolved_retention(&self) -> chrono::Duration {
        secs_to_duration(self.resolved_retention_secs)
    }

    pub fn window_idle(&self) -> chrono::Duration {
        secs_to_duration(self.window_idle_secs)
    }
}

/// Saturates instead of panicking on out-of-range values
fn secs_to_duration(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Eviction sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sweep_interval(),
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of plain text
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_category_capacity() -> usize {
    10_000
}

fn default_max_age() -> Option<u64> {
    Some(24 * 60 * 60)
}

fn default_event_capacity() -> usize {
    1_000
}

fn default_resolved_retention() -> u64 {
    24 * 60 * 60
}

fn default_max_alerts() -> usize {
    1_000
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_window_idle() -> u64 {
    60 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TelemetryConfig {
    /// Load configuration: defaults, then an optional file, then `MINTPULSE_*` env vars.
    ///
    /// Nested keys use a double underscore, e.g. `MINTPULSE_STORE__CAPACITY_PER_CATEGORY`.
    pub fn load(path: Option<&str>) -> TelemetryResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&TelemetryConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MINTPULSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: TelemetryConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.store.capacity_per_category == 0 {
            return Err(TelemetryError::Config(
                "store.capacity_per_category must be at least 1".into(),
            ));
        }
        if self.latency.capacity_per_event_type == 0 {
            return Err(TelemetryError::Config(
                "latency.capacity_per_event_type must be at least 1".into(),
            ));
        }
        if self.alerts.event_channel_capacity == 0 {
            return Err(TelemetryError::Config(
                "alerts.event_channel_capacity must be at least 1".into(),
            ));
        }
        if self.sweep.enabled && self.sweep.interval_secs == 0 {
            return Err(TelemetryError::Config(
                "sweep.interval_secs must be at least 1 when the sweep is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Small capacities and no age limit, for tests and local runs
    pub fn development() -> Self {
        Self {
            store: StoreConfig {
                capacity_per_category: 1_000,
                max_age_secs: None,
            },
            ..Default::default()
        }
    }
}
