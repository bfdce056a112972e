//! # MintPulse Types
//!
//! Plain data shared by the telemetry engine and its callers.
//!
//! - [`MetricSample`]: one immutable measurement, partitioned by [`MetricCategory`]
//! - [`Tags`]: ordered string dimensions with normalized keys
//! - [`AggregateBucket`]: grouped count/average/percentiles
//! - [`AlertRule`] and [`Alert`]: threshold rules and the alerts they raise
//! - [`LatencyRecord`] and [`LatencyStats`]: event latency tracking

pub mod aggregate;
pub mod alert;
pub mod category;
pub mod latency;
pub mod rule;
pub mod sample;
pub mod tags;

pub use aggregate::AggregateBucket;
pub use alert::{Alert, AlertFilter, AlertId, AlertSeverity};
pub use category::{MetricCategory, UnknownCategory};
pub use latency::{LatencyRecord, LatencyStats};
pub use rule::{
    AlertRule, AlertRuleBuilder, Comparator, NamePattern, RuleId, RuleStatistic,
    MAX_AVERAGE_WINDOW,
};
pub use sample::{CategoryFields, MetricSample};
pub use tags::{keys, Tags};
