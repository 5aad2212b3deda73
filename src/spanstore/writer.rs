//! Write path: catalog the operation, then store the span.

use super::SpanWriter;
use crate::core::types::Span;
use crate::core::Result;
use crate::document::SPAN_SCHEMA;
use crate::metrics::{status_of, MetricsSink};
use crate::storage::{OperationRepository, SpanRepository};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Store writer.
pub struct StoreWriter {
    spans: Arc<SpanRepository>,
    operations: Arc<OperationRepository>,
    ttl: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl StoreWriter {
    pub fn new(
        spans: Arc<SpanRepository>,
        operations: Arc<OperationRepository>,
        ttl: Duration,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            spans,
            operations,
            ttl,
            metrics,
        }
    }

    async fn write(&self, span: &Span) -> Result<()> {
        if let Err(e) = self.operations.record(span, self.ttl).await {
            tracing::error!(
                "failed to catalog operation {}/{}: {}",
                span.service_name(),
                span.operation_name,
                e
            );
            return Err(e);
        }

        match self.spans.write(span, self.ttl).await {
            Ok(key) => {
                tracing::trace!("stored span {} of trace {} as {}", span.span_id, span.trace_id, key);
                Ok(())
            },
            Err(e) => {
                tracing::error!("failed to write span {} of trace {}: {}", span.span_id, span.trace_id, e);
                Err(e)
            },
        }
    }
}

#[async_trait::async_trait]
impl SpanWriter for StoreWriter {
    async fn write_span(&self, span: &Span) -> Result<()> {
        let start = Instant::now();
        let result = self.write(span).await;
        self.metrics
            .record_write(SPAN_SCHEMA.name, status_of(&result), start.elapsed());
        result
    }
}
