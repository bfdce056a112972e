//! # mintpulse-engine
//!
//! In-process telemetry for the marketplace: ingestion, bounded storage,
//! grouped statistics and threshold alerting.
//!
//! ## Architecture
//!
//! ```text
//!   handlers / listeners
//!          │ measure(), track_api(), record_*_metric()
//!          ▼
//!   ┌──────────────┐   event samples   ┌─────────────────────┐
//!   │  Telemetry   │──────────────────►│ EventLatencyMonitor │ ← ring buffer per type
//!   │  ::ingest    │                   └─────────────────────┘
//!   └──────┬───────┘
//!          │                ┌──────────────┐
//!          ├───────────────►│ MetricStore  │ ← ring buffer per category
//!          │                └──────┬───────┘
//!          │                       │ query()
//!          ▼                       ▼
//!   ┌──────────────┐        ┌──────────────┐
//!   │ AlertManager │        │  Aggregator  │ → count / average / p95 / p99
//!   └──────────────┘        └──────────────┘
//! ```
//!
//! Ingestion never fails and never blocks on I/O. When a partition is full
//! the oldest data is dropped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use mintpulse_engine::{Telemetry, TelemetryConfig, TimeRange};
//! use mintpulse_types::{MetricCategory, Tags};
//!
//! let telemetry = Telemetry::new(TelemetryConfig::default()).unwrap();
//!
//! telemetry.track_api("/api/listings", "GET", 200, Duration::from_millis(42), Tags::new());
//! let listed: Result<usize, String> =
//!     telemetry.measure(MetricCategory::Blockchain, "get_account", Tags::new(), || Ok(3));
//!
//! let buckets = telemetry
//!     .aggregate(MetricCategory::Api, &TimeRange::last_from_str(Some("1h")), "endpoint")
//!     .unwrap();
//! ```

#![deny(unsafe_code)]

pub mod aggregator;
pub mod alerts;
pub mod config;
pub mod error;
pub mod instrument;
pub mod latency;
pub mod logging;
pub mod ring;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod time_range;

pub use aggregator::{aggregate_samples, Aggregator};
pub use alerts::{AlertEvent, AlertManager};
pub use config::{
    AlertConfig, LatencyConfig, LoggingConfig, StoreConfig, SweepConfig, TelemetryConfig,
};
pub use error::{TelemetryError, TelemetryResult};
pub use instrument::{duration_ms, MeasureGuard};
pub use latency::EventLatencyMonitor;
pub use logging::init_tracing;
pub use ring::RingBuffer;
pub use stats::{nearest_rank, Summary};
pub use store::{MetricStore, PartitionStats, SampleQuery, DEFAULT_QUERY_LIMIT};
pub use telemetry::{PerformanceReport, SweepReport, Telemetry};
pub use time_range::{default_range, parse_time_range, TimeRange};
