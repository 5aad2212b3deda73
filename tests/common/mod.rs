//! Common test utilities and fixtures.

#![allow(dead_code)]

use redtrace_lib::core::{KeyValue, Span, SpanId, StorageConfig, TraceId};
use redtrace_lib::metrics::{MetricsSink, StoreMetrics};
use redtrace_lib::spanstore::TraceStore;
use redtrace_lib::storage::{DocumentEngine, MemoryEngine};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Start of the fixture time window, in microseconds since the epoch.
pub const BASE_MICROS: u64 = 1_700_000_000_000_000;

/// Test fixture builder for creating spans with sensible defaults.
pub struct TestSpanBuilder {
    trace_num: u64,
    span_num: u64,
    service: String,
    operation: String,
    duration_ms: u64,
    is_root: bool,
    tags: Vec<KeyValue>,
}

impl TestSpanBuilder {
    pub fn new(trace_num: u64, span_num: u64) -> Self {
        Self {
            trace_num,
            span_num,
            service: "test-service".to_string(),
            operation: format!("operation-{}", span_num),
            duration_ms: 100,
            is_root: false,
            tags: Vec::new(),
        }
    }

    pub fn service(mut self, service: &str) -> Self {
        self.service = service.to_string();
        self
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.operation = operation.to_string();
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn as_root(mut self) -> Self {
        self.is_root = true;
        self
    }

    pub fn tag(mut self, tag: KeyValue) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn build(self) -> Span {
        let trace_id = TraceId::new(0, self.trace_num);
        let mut builder = Span::builder()
            .trace_id(trace_id)
            .span_id(SpanId((self.trace_num << 16) | self.span_num))
            .service_name(self.service)
            .operation_name(self.operation)
            .start_time(fixture_time(self.trace_num * 1_000 + self.span_num))
            .duration(Duration::from_millis(self.duration_ms));

        if !self.is_root {
            builder = builder.child_of(trace_id, SpanId(self.trace_num << 16));
        }
        for tag in self.tags {
            builder = builder.tag(tag);
        }

        builder.build().unwrap()
    }
}

/// Fixture timestamp `offset_micros` after [`BASE_MICROS`].
pub fn fixture_time(offset_micros: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_micros(BASE_MICROS + offset_micros)
}

/// Window covering every fixture span.
pub fn fixture_window() -> (SystemTime, SystemTime) {
    (fixture_time(0), fixture_time(1_000_000_000))
}

/// Short timeouts so a stuck engine fails the test quickly.
pub fn test_storage_config() -> StorageConfig {
    StorageConfig {
        ttl: Duration::from_secs(60),
        write_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        catalog_limit: 1_000,
    }
}

/// Store over a fresh in-memory engine, with the engine and metrics exposed.
pub async fn open_memory_store() -> (TraceStore, Arc<MemoryEngine>, Arc<StoreMetrics>) {
    let engine = Arc::new(MemoryEngine::new());
    let metrics = StoreMetrics::shared();
    let store = TraceStore::open(
        Arc::clone(&engine) as Arc<dyn DocumentEngine>,
        &test_storage_config(),
        Arc::clone(&metrics) as Arc<dyn MetricsSink>,
    )
    .await
    .unwrap();
    (store, engine, metrics)
}

/// Macro for creating a test span quickly.
#[macro_export]
macro_rules! test_span {
    ($trace_num:expr, $span_num:expr) => {
        TestSpanBuilder::new($trace_num, $span_num).build()
    };
    ($trace_num:expr, $span_num:expr, $service:expr) => {
        TestSpanBuilder::new($trace_num, $span_num).service($service).build()
    };
}
