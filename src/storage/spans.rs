//! Span documents: writes with retention and two-phase trace assembly.

use super::engine::{AggregateRequest, DocumentEngine, Reducer, SortKey};
use super::repository::{JsonRepository, Timeouts};
use crate::core::types::{Span, Trace, TraceId, TraceQueryParameters};
use crate::core::{RedtraceError, Result};
use crate::document::schema::span_fields;
use crate::document::{span_from_document, span_to_document, SpanDocument, SPAN_SCHEMA};
use crate::query::{decode, trace_filter, trace_ids_filter};
use ahash::AHashMap;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on the spans fetched for one trace lookup; matches the result
/// window of the backing search engine.
pub const MAX_FETCHED_SPANS: usize = 100_000;

/// Alias of the per-trace span count in the discovery aggregation.
const COUNT_ALIAS: &str = "count";

/// Repository of span documents.
pub struct SpanRepository {
    repo: JsonRepository<SpanDocument>,
}

impl SpanRepository {
    pub fn new(engine: Arc<dyn DocumentEngine>, timeouts: Timeouts) -> Self {
        Self {
            repo: JsonRepository::new(engine, SPAN_SCHEMA, timeouts),
        }
    }

    pub async fn create_index(&self) -> Result<()> {
        self.repo.create_index().await
    }

    /// Store a span and set its time-to-live. Returns the document key.
    ///
    /// The write is unconditional; a failed TTL update is logged and does not
    /// fail the write.
    pub async fn write(&self, span: &Span, ttl: Duration) -> Result<String> {
        let mut doc = span_to_document(span);
        self.repo.save(&mut doc).await?;

        match self.repo.expire(&doc.key, ttl).await {
            Ok(true) => {},
            Ok(false) => tracing::warn!("span {}: key vanished before its TTL was set", doc.key),
            Err(e) => tracing::warn!("span {}: failed to set TTL: {}", doc.key, e),
        }
        Ok(doc.key)
    }

    /// Phase one: ids of the traces matching `query`, most spans first.
    ///
    /// Ids are returned in their stored (escaped) form.
    pub async fn find_trace_ids(&self, query: &TraceQueryParameters) -> Result<Vec<String>> {
        let filter = trace_filter(query)?;
        let request = AggregateRequest {
            query: filter.to_string(),
            group_by: format!("@{}", span_fields::TRACE_ID),
            reducer: Reducer::Count {
                alias: COUNT_ALIAS.to_string(),
            },
            sort_by: vec![SortKey::desc(COUNT_ALIAS), SortKey::asc(span_fields::TRACE_ID)],
            limit: query.num_traces,
        };

        let reply = self.repo.aggregate(&request).await?;
        Ok(reply
            .rows
            .into_iter()
            .filter_map(|mut row| row.remove(span_fields::TRACE_ID))
            .collect())
    }

    /// Discover matching trace ids, fetch their spans in one search and group
    /// them into traces in discovery order.
    pub async fn find_traces(&self, query: &TraceQueryParameters) -> Result<Vec<Trace>> {
        let trace_ids = self.find_trace_ids(query).await?;
        if trace_ids.is_empty() {
            return Ok(Vec::new());
        }

        let page = self.repo.search(&trace_ids_filter(&decoded(&trace_ids)), 0, MAX_FETCHED_SPANS).await?;
        if page.total > page.items.len() {
            tracing::warn!(
                "trace lookup truncated to {} of {} spans",
                page.items.len(),
                page.total
            );
        }

        let mut by_trace: AHashMap<String, Vec<Span>> = AHashMap::with_capacity(trace_ids.len());
        for doc in &page.items {
            by_trace
                .entry(doc.trace_id.clone())
                .or_default()
                .push(span_from_document(doc));
        }

        let mut traces = Vec::with_capacity(trace_ids.len());
        for id in &trace_ids {
            let Some(spans) = by_trace.remove(id) else {
                continue;
            };
            match TraceId::from_hex(&decode(id)) {
                Ok(trace_id) => traces.push(Trace::from_spans(trace_id, spans)),
                Err(e) => tracing::warn!("dropping trace with unparsable id '{}': {}", id, e),
            }
        }
        Ok(traces)
    }

    /// All stored spans of one trace.
    pub async fn get_trace(&self, trace_id: TraceId) -> Result<Trace> {
        let id = trace_id.to_string();
        let page = self.repo.search(&trace_ids_filter(&[&id]), 0, MAX_FETCHED_SPANS).await?;
        if page.items.is_empty() {
            return Err(RedtraceError::not_found(format!("trace {}", id)));
        }

        let spans = page.items.iter().map(span_from_document).collect();
        Ok(Trace::from_spans(trace_id, spans))
    }
}

/// Builders escape their input, so stored ids are decoded before reuse.
fn decoded(ids: &[String]) -> Vec<String> {
    ids.iter().map(|id| decode(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SpanId;
    use crate::storage::MemoryEngine;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn repository() -> SpanRepository {
        let timeouts = Timeouts {
            read: Duration::from_secs(1),
            write: Duration::from_secs(1),
        };
        SpanRepository::new(Arc::new(MemoryEngine::new()), timeouts)
    }

    fn span(trace: u64, span: u64, service: &str, start_micros: u64) -> Span {
        Span::builder()
            .trace_id(TraceId::new(0, trace))
            .span_id(SpanId(span))
            .service_name(service)
            .operation_name("op")
            .start_time(UNIX_EPOCH + Duration::from_micros(start_micros))
            .duration(Duration::from_micros(10))
            .build()
            .unwrap()
    }

    fn window(service: &str) -> TraceQueryParameters {
        TraceQueryParameters::new(service, UNIX_EPOCH, SystemTime::now())
    }

    #[tokio::test]
    async fn test_trace_ids_ordered_by_span_count() {
        let repo = repository();
        repo.create_index().await.unwrap();
        for s in [span(2, 1, "api", 5), span(1, 2, "api", 5), span(1, 3, "api", 6)] {
            repo.write(&s, Duration::from_secs(60)).await.unwrap();
        }

        let ids = repo.find_trace_ids(&window("api")).await.unwrap();
        assert_eq!(ids, vec!["0000000000000001", "0000000000000002"]);

        let limited = repo.find_trace_ids(&window("api").limit(1)).await.unwrap();
        assert_eq!(limited, vec!["0000000000000001"]);
    }

    #[tokio::test]
    async fn test_find_traces_groups_spans() {
        let repo = repository();
        repo.create_index().await.unwrap();
        for s in [span(7, 1, "api", 5), span(7, 2, "api", 6), span(7, 3, "db", 7)] {
            repo.write(&s, Duration::from_secs(60)).await.unwrap();
        }

        let traces = repo.find_traces(&window("api")).await.unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].trace_id, TraceId::new(0, 7));
        assert_eq!(traces[0].spans.len(), 3);
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let repo = repository();
        repo.create_index().await.unwrap();
        repo.write(&span(1, 1, "api", 5), Duration::from_secs(60)).await.unwrap();

        assert!(repo.find_traces(&window("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_trace_not_found() {
        let repo = repository();
        repo.create_index().await.unwrap();
        let err = repo.get_trace(TraceId::new(0, 99)).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
