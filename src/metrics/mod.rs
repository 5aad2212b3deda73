//! Store operation metrics.
//!
//! Reads and writes are counted per index, operation and status together
//! with their accumulated and maximum latency. Components receive the sink
//! as an `Arc<dyn MetricsSink>`.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Status label of a successful call.
pub const STATUS_OK: &str = "ok";
/// Status label of a failed call.
pub const STATUS_ERROR: &str = "error";

/// Operation label used for writes.
const WRITE_OPERATION: &str = "write";

/// Status label for a call result
pub fn status_of<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        STATUS_OK
    } else {
        STATUS_ERROR
    }
}

/// Destination of store metrics.
pub trait MetricsSink: Send + Sync {
    /// Record one write into `index`.
    fn record_write(&self, index: &str, status: &str, elapsed: Duration);

    /// Record one read of `index` by `operation`.
    fn record_read(&self, index: &str, operation: &str, status: &str, elapsed: Duration);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_write(&self, _index: &str, _status: &str, _elapsed: Duration) {}

    fn record_read(&self, _index: &str, _operation: &str, _status: &str, _elapsed: Duration) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricKey {
    index: String,
    operation: String,
    status: String,
}

/// Lock-free counters of one label set.
#[derive(Debug, Default)]
struct MetricCell {
    count: AtomicU64,
    total_micros: AtomicU64,
    max_micros: AtomicU64,
}

impl MetricCell {
    fn observe(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);
    }
}

/// Point-in-time view of one label set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSample {
    pub index: String,
    pub operation: String,
    pub status: String,
    pub count: u64,
    pub total_micros: u64,
    pub max_micros: u64,
}

impl MetricSample {
    /// Mean latency in microseconds
    pub fn mean_micros(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_micros / self.count
        }
    }
}

/// In-process metrics sink.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    cells: DashMap<MetricKey, MetricCell>,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, ready to inject
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn observe(&self, index: &str, operation: &str, status: &str, elapsed: Duration) {
        let key = MetricKey {
            index: index.to_string(),
            operation: operation.to_string(),
            status: status.to_string(),
        };
        self.cells.entry(key).or_default().observe(elapsed);
    }

    /// All samples, sorted by index, operation and status.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let mut samples: Vec<MetricSample> = self
            .cells
            .iter()
            .map(|entry| {
                let (key, cell) = entry.pair();
                MetricSample {
                    index: key.index.clone(),
                    operation: key.operation.clone(),
                    status: key.status.clone(),
                    count: cell.count.load(Ordering::Relaxed),
                    total_micros: cell.total_micros.load(Ordering::Relaxed),
                    max_micros: cell.max_micros.load(Ordering::Relaxed),
                }
            })
            .collect();
        samples.sort_by(|a, b| {
            (&a.index, &a.operation, &a.status).cmp(&(&b.index, &b.operation, &b.status))
        });
        samples
    }

    /// Count recorded for one label set
    pub fn count(&self, index: &str, operation: &str, status: &str) -> u64 {
        let key = MetricKey {
            index: index.to_string(),
            operation: operation.to_string(),
            status: status.to_string(),
        };
        self.cells
            .get(&key)
            .map_or(0, |cell| cell.count.load(Ordering::Relaxed))
    }

    /// Writes recorded for one index and status
    pub fn write_count(&self, index: &str, status: &str) -> u64 {
        self.count(index, WRITE_OPERATION, status)
    }
}

impl MetricsSink for StoreMetrics {
    fn record_write(&self, index: &str, status: &str, elapsed: Duration) {
        self.observe(index, WRITE_OPERATION, status, elapsed);
    }

    fn record_read(&self, index: &str, operation: &str, status: &str, elapsed: Duration) {
        self.observe(index, operation, status, elapsed);
    }
}
