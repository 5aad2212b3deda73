//! Operation catalog: one row per observed (service, operation) pair.

use super::engine::{AggregateRequest, DocumentEngine, Reducer, SortKey};
use super::repository::{JsonRepository, Timeouts};
use crate::core::types::{Operation, OperationQueryParameters, Span};
use crate::core::Result;
use crate::document::schema::operation_fields;
use crate::document::{operation_document, operation_from_document, OperationDocument, OPERATION_SCHEMA};
use crate::query::{decode, operation_hash_filter, service_operations_filter, FilterExpr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use xxhash_rust::xxh3::xxh3_64;

/// Byte between service and operation in the hashed content, so that
/// ("ab", "c") and ("a", "bc") hash differently.
const HASH_SEPARATOR: u8 = 0x1f;

/// Stable content hash of a (service, operation) pair, as 16 hex digits.
pub fn operation_hash(service: &str, operation: &str) -> String {
    let mut content = Vec::with_capacity(service.len() + operation.len() + 1);
    content.extend_from_slice(service.as_bytes());
    content.push(HASH_SEPARATOR);
    content.extend_from_slice(operation.as_bytes());
    format!("{:016x}", xxh3_64(&content))
}

/// Repository of catalog rows.
///
/// Recording is check-then-insert under an async mutex owned by this
/// instance, so at most one row per pair is written from one process.
pub struct OperationRepository {
    repo: JsonRepository<OperationDocument>,
    guard: Mutex<()>,
    catalog_limit: usize,
}

impl OperationRepository {
    pub fn new(engine: Arc<dyn DocumentEngine>, timeouts: Timeouts, catalog_limit: usize) -> Self {
        Self {
            repo: JsonRepository::new(engine, OPERATION_SCHEMA, timeouts),
            guard: Mutex::new(()),
            catalog_limit,
        }
    }

    pub async fn create_index(&self) -> Result<()> {
        self.repo.create_index().await
    }

    /// Record the span's (service, operation) pair unless already present.
    ///
    /// Returns true when a new row was written.
    pub async fn record(&self, span: &Span, ttl: Duration) -> Result<bool> {
        let hash = operation_hash(span.service_name(), &span.operation_name);
        let _held = self.guard.lock().await;

        let existing = self.repo.search(&operation_hash_filter(&hash), 0, 1).await?;
        if existing.total > 0 {
            tracing::debug!(
                "operation {}/{} already catalogued",
                span.service_name(),
                span.operation_name
            );
            return Ok(false);
        }

        let mut doc = operation_document(span, hash);
        self.repo.save(&mut doc).await?;
        match self.repo.expire(&doc.key, ttl).await {
            Ok(true) => {},
            Ok(false) => tracing::warn!("operation {}: key vanished before its TTL was set", doc.key),
            Err(e) => tracing::warn!("operation {}: failed to set TTL: {}", doc.key, e),
        }
        Ok(true)
    }

    /// Distinct service names in the catalog, sorted.
    pub async fn services(&self) -> Result<Vec<String>> {
        let request = AggregateRequest {
            query: FilterExpr::all().to_string(),
            group_by: format!("@{}", operation_fields::SERVICE),
            reducer: Reducer::Count {
                alias: "count".to_string(),
            },
            sort_by: vec![SortKey::asc(operation_fields::SERVICE)],
            limit: self.catalog_limit,
        };
        let reply = self.repo.aggregate(&request).await?;

        let mut services: Vec<String> = reply
            .rows
            .iter()
            .filter_map(|row| row.get(operation_fields::SERVICE))
            .map(|service| decode(service))
            .collect();
        services.sort();
        services.dedup();
        Ok(services)
    }

    /// Operations recorded for a service, optionally of one span kind.
    pub async fn operations(&self, query: &OperationQueryParameters) -> Result<Vec<Operation>> {
        let filter = service_operations_filter(&query.service_name, query.span_kind.as_deref());
        let page = self.repo.search(&filter, 0, self.catalog_limit).await?;

        let mut operations: Vec<Operation> = page.items.iter().map(operation_from_document).collect();
        operations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.span_kind.cmp(&b.span_kind)));
        Ok(operations)
    }
}
