//! Read path: trace search, trace lookup and the service catalog.

use super::{DependencyReader, SpanReader};
use crate::core::types::{
    DependencyLink, Operation, OperationQueryParameters, Trace, TraceId, TraceQueryParameters,
};
use crate::core::Result;
use crate::document::{OPERATION_SCHEMA, SPAN_SCHEMA};
use crate::metrics::{status_of, MetricsSink};
use crate::query::decode;
use crate::storage::{OperationRepository, SpanRepository};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Store reader.
pub struct StoreReader {
    spans: Arc<SpanRepository>,
    operations: Arc<OperationRepository>,
    metrics: Arc<dyn MetricsSink>,
}

impl StoreReader {
    pub fn new(
        spans: Arc<SpanRepository>,
        operations: Arc<OperationRepository>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            spans,
            operations,
            metrics,
        }
    }

    /// Runs one read and records its latency under `index`/`operation`.
    async fn observed<T, F>(&self, index: &str, operation: &str, read: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = read.await;
        self.metrics
            .record_read(index, operation, status_of(&result), start.elapsed());
        if let Err(e) = &result {
            if !e.is_not_found() {
                tracing::error!("{} on '{}' failed: {}", operation, index, e);
            }
        }
        result
    }
}

#[async_trait::async_trait]
impl SpanReader for StoreReader {
    async fn get_trace(&self, trace_id: TraceId) -> Result<Trace> {
        self.observed(SPAN_SCHEMA.name, "get_trace", self.spans.get_trace(trace_id))
            .await
    }

    async fn get_services(&self) -> Result<Vec<String>> {
        self.observed(OPERATION_SCHEMA.name, "get_services", self.operations.services())
            .await
    }

    async fn get_operations(&self, query: &OperationQueryParameters) -> Result<Vec<Operation>> {
        self.observed(
            OPERATION_SCHEMA.name,
            "get_operations",
            self.operations.operations(query),
        )
        .await
    }

    async fn find_traces(&self, query: &TraceQueryParameters) -> Result<Vec<Trace>> {
        self.observed(SPAN_SCHEMA.name, "find_traces", self.spans.find_traces(query))
            .await
    }

    async fn find_trace_ids(&self, query: &TraceQueryParameters) -> Result<Vec<TraceId>> {
        let ids = self
            .observed(SPAN_SCHEMA.name, "find_trace_ids", self.spans.find_trace_ids(query))
            .await?;

        Ok(ids
            .iter()
            .filter_map(|id| match TraceId::from_hex(&decode(id)) {
                Ok(trace_id) => Some(trace_id),
                Err(e) => {
                    tracing::warn!("dropping unparsable trace id '{}': {}", id, e);
                    None
                },
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl DependencyReader for StoreReader {
    async fn get_dependencies(
        &self,
        _end_time: SystemTime,
        _lookback: Duration,
    ) -> Result<Vec<DependencyLink>> {
        Ok(Vec::new())
    }
}
