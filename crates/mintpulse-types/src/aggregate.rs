//! Aggregation output

use serde::{Deserialize, Serialize};

/// Grouped statistics over a window of samples.
///
/// `count` is the number of contributing samples and is never zero;
/// `p95 <= p99` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    /// Value of the group-by dimension
    pub group: String,
    pub count: usize,
    pub average: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    /// Samples in the group that recorded a failed operation
    pub failures: usize,
}

impl AggregateBucket {
    /// Fraction of failed samples (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.failures as f64 / self.count as f64
        }
    }
}
