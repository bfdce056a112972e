//! Per-event-type latency tracking.
//!
//! Each event type gets its own fixed-capacity ring buffer behind its own
//! lock, so recording `mint` latencies never contends with `transfer`. The
//! oldest record of a type is overwritten once its buffer is full.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use mintpulse_types::{LatencyRecord, LatencyStats};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::LatencyConfig;
use crate::ring::RingBuffer;
use crate::stats::Summary;

/// Record tagged with a monitor-wide insertion sequence.
type Sequenced = (u64, LatencyRecord);

type LatencyBuffer = Arc<Mutex<RingBuffer<Sequenced>>>;

/// Ring-buffer latency tracker, independent of the metric store.
pub struct EventLatencyMonitor {
    buffers: DashMap<String, LatencyBuffer>,
    sequence: AtomicU64,
    capacity: usize,
}

impl EventLatencyMonitor {
    pub fn new(config: &LatencyConfig) -> Self {
        Self::with_capacity(config.capacity_per_event_type)
    }

    pub fn with_capacity(capacity_per_event_type: usize) -> Self {
        Self {
            buffers: DashMap::new(),
            sequence: AtomicU64::new(0),
            capacity: capacity_per_event_type.max(1),
        }
    }

    /// Capacity of each event type's buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn buffer(&self, event_type: &str) -> LatencyBuffer {
        if let Some(buffer) = self.buffers.get(event_type) {
            return Arc::clone(buffer.value());
        }
        let capacity = self.capacity;
        Arc::clone(
            self.buffers
                .entry(event_type.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(RingBuffer::new(capacity))))
                .value(),
        )
    }

    /// Append a latency observation for `event_type`.
    pub fn record(&self, event_type: &str, latency_ms: f64) -> LatencyRecord {
        let record = LatencyRecord::new(event_type, latency_ms);
        let buffer = self.buffer(event_type);

        let mut ring = buffer.lock();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        if ring.push((seq, record.clone())).is_some() {
            debug!(event_type, "latency buffer full, overwrote oldest record");
        }
        record
    }

    /// Summary over the retained records of one event type.
    ///
    /// Unknown or empty types return [`LatencyStats::empty`].
    pub fn get_latency_stats(&self, event_type: &str) -> LatencyStats {
        let Some(buffer) = self.buffers.get(event_type).map(|b| Arc::clone(b.value())) else {
            return LatencyStats::empty(event_type);
        };

        let mut values: Vec<f64> = buffer.lock().iter().map(|(_, r)| r.latency_ms).collect();
        match Summary::from_values(&mut values) {
            Some(summary) => LatencyStats {
                event_type: event_type.to_string(),
                sample_count: summary.count,
                min: summary.min,
                max: summary.max,
                average: summary.mean,
                p95: summary.p95,
                p99: summary.p99,
            },
            None => LatencyStats::empty(event_type),
        }
    }

    /// Up to `limit` most recent records, newest first.
    ///
    /// With no event type, records from every type are merged by insertion
    /// order.
    pub fn get_recent_latency(&self, event_type: Option<&str>, limit: usize) -> Vec<LatencyRecord> {
        if limit == 0 {
            return Vec::new();
        }

        let buffers: Vec<LatencyBuffer> = match event_type {
            Some(event_type) => self
                .buffers
                .get(event_type)
                .map(|b| vec![Arc::clone(b.value())])
                .unwrap_or_default(),
            None => self.buffers.iter().map(|b| Arc::clone(b.value())).collect(),
        };

        let mut recent: Vec<Sequenced> = Vec::new();
        for buffer in &buffers {
            let ring = buffer.lock();
            recent.extend(ring.iter().rev().take(limit).cloned());
        }

        if buffers.len() > 1 {
            recent.sort_by(|a, b| b.0.cmp(&a.0));
            recent.truncate(limit);
        }
        recent.into_iter().map(|(_, record)| record).collect()
    }

    /// Event types seen so far, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.buffers.iter().map(|b| b.key().clone()).collect();
        types.sort();
        types
    }

    /// Stats for every known event type, sorted by type.
    pub fn all_stats(&self) -> Vec<LatencyStats> {
        self.event_types()
            .iter()
            .map(|event_type| self.get_latency_stats(event_type))
            .collect()
    }

    /// Total retained records across all types.
    pub fn total_records(&self) -> usize {
        self.buffers.iter().map(|b| b.value().lock().len()).sum()
    }
}
