//! Span store contract consumed by the tracing platform.
//!
//! [`TraceStore`] wires the repositories onto one shared engine handle and
//! hands out the reader, writer and dependency reader.

pub mod reader;
pub mod writer;

use crate::core::types::{
    DependencyLink, Operation, OperationQueryParameters, Span, Trace, TraceId,
    TraceQueryParameters,
};
use crate::core::{Result, StorageConfig};
use crate::metrics::MetricsSink;
use crate::storage::{with_timeout, DocumentEngine, OperationRepository, SpanRepository, Timeouts};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub use reader::StoreReader;
pub use writer::StoreWriter;

/// Write side of the span store.
#[async_trait::async_trait]
pub trait SpanWriter: Send + Sync {
    async fn write_span(&self, span: &Span) -> Result<()>;
}

/// Read side of the span store.
#[async_trait::async_trait]
pub trait SpanReader: Send + Sync {
    /// All spans of one trace; `NotFound` when none are stored.
    async fn get_trace(&self, trace_id: TraceId) -> Result<Trace>;

    /// Distinct service names, sorted.
    async fn get_services(&self) -> Result<Vec<String>>;

    async fn get_operations(&self, query: &OperationQueryParameters) -> Result<Vec<Operation>>;

    /// Matching traces, possibly empty.
    async fn find_traces(&self, query: &TraceQueryParameters) -> Result<Vec<Trace>>;

    async fn find_trace_ids(&self, query: &TraceQueryParameters) -> Result<Vec<TraceId>>;
}

/// Service dependency graph.
#[async_trait::async_trait]
pub trait DependencyReader: Send + Sync {
    async fn get_dependencies(
        &self,
        end_time: SystemTime,
        lookback: Duration,
    ) -> Result<Vec<DependencyLink>>;
}

/// Trace store over a document engine.
pub struct TraceStore {
    engine: Arc<dyn DocumentEngine>,
    reader: Arc<StoreReader>,
    writer: Arc<StoreWriter>,
    timeouts: Timeouts,
}

impl TraceStore {
    /// Declare both indices and build the reader and writer.
    pub async fn open(
        engine: Arc<dyn DocumentEngine>,
        config: &StorageConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let timeouts = Timeouts::from(config);
        let spans = Arc::new(SpanRepository::new(Arc::clone(&engine), timeouts));
        let operations = Arc::new(OperationRepository::new(
            Arc::clone(&engine),
            timeouts,
            config.catalog_limit,
        ));

        spans.create_index().await?;
        operations.create_index().await?;

        let reader = Arc::new(StoreReader::new(
            Arc::clone(&spans),
            Arc::clone(&operations),
            Arc::clone(&metrics),
        ));
        let writer = Arc::new(StoreWriter::new(spans, operations, config.ttl, metrics));

        tracing::info!(
            "trace store ready (ttl {:?}, read timeout {:?}, write timeout {:?})",
            config.ttl,
            config.read_timeout,
            config.write_timeout
        );
        Ok(Self {
            engine,
            reader,
            writer,
            timeouts,
        })
    }

    pub fn span_reader(&self) -> Arc<dyn SpanReader> {
        Arc::clone(&self.reader) as Arc<dyn SpanReader>
    }

    pub fn span_writer(&self) -> Arc<dyn SpanWriter> {
        Arc::clone(&self.writer) as Arc<dyn SpanWriter>
    }

    pub fn dependency_reader(&self) -> Arc<dyn DependencyReader> {
        Arc::clone(&self.reader) as Arc<dyn DependencyReader>
    }

    /// Release the engine handle.
    pub async fn close(&self) -> Result<()> {
        with_timeout(self.timeouts.write, self.engine.close()).await
    }
}
