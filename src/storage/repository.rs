//! Typed JSON repository over a document engine.
//!
//! Serializes entities into engine documents and back, keeps the engine
//! assigned key and version on the entity, and bounds every engine call by
//! the configured read or write timeout.

use super::engine::{AggregateReply, AggregateRequest, DocumentEngine, SearchRequest};
use crate::core::{RedtraceError, Result, StorageConfig};
use crate::document::{Entity, IndexSchema};
use crate::query::FilterExpr;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Deadlines applied to engine calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
    pub write: Duration,
}

impl From<&StorageConfig> for Timeouts {
    fn from(config: &StorageConfig) -> Self {
        Self {
            read: config.read_timeout,
            write: config.write_timeout,
        }
    }
}

/// Runs `fut` under `timeout`, mapping expiry to [`RedtraceError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(RedtraceError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// One page of typed search results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Matches before paging
    pub total: usize,
    pub items: Vec<T>,
}

/// Repository of `T` documents stored in one index.
pub struct JsonRepository<T: Entity> {
    engine: Arc<dyn DocumentEngine>,
    schema: IndexSchema,
    timeouts: Timeouts,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> JsonRepository<T> {
    pub fn new(engine: Arc<dyn DocumentEngine>, schema: IndexSchema, timeouts: Timeouts) -> Self {
        Self {
            engine,
            schema,
            timeouts,
            _entity: PhantomData,
        }
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Declare the index; an existing index is left untouched.
    pub async fn create_index(&self) -> Result<()> {
        let created =
            with_timeout(self.timeouts.write, self.engine.create_index(&self.schema)).await?;
        if created {
            tracing::info!("created index '{}'", self.schema.name);
        } else {
            tracing::debug!("index '{}' already exists", self.schema.name);
        }
        Ok(())
    }

    /// Save `entity`, storing the assigned key and version back on it.
    pub async fn save(&self, entity: &mut T) -> Result<()> {
        let body = serde_json::to_value(&*entity)?;
        let key = (!entity.key().is_empty()).then(|| entity.key().to_string());
        let saved = with_timeout(
            self.timeouts.write,
            self.engine.save(self.schema.name, key.as_deref(), entity.ver(), body),
        )
        .await?;
        entity.set_key(saved.key);
        entity.set_ver(saved.ver);
        Ok(())
    }

    /// Search the index. Documents that no longer deserialize are skipped.
    pub async fn search(&self, filter: &FilterExpr, offset: usize, limit: usize) -> Result<Page<T>> {
        let request = SearchRequest {
            query: filter.to_string(),
            offset,
            limit,
        };
        let reply = with_timeout(
            self.timeouts.read,
            self.engine.search(self.schema.name, &request),
        )
        .await?;

        let items = reply
            .documents
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<T>(doc.body) {
                Ok(mut entity) => {
                    entity.set_key(doc.key);
                    entity.set_ver(doc.ver);
                    Some(entity)
                },
                Err(e) => {
                    tracing::warn!("{}:{}: skipping undecodable document: {}", self.schema.name, doc.key, e);
                    None
                },
            })
            .collect();

        Ok(Page {
            total: reply.total,
            items,
        })
    }

    pub async fn aggregate(&self, request: &AggregateRequest) -> Result<AggregateReply> {
        with_timeout(
            self.timeouts.read,
            self.engine.aggregate(self.schema.name, request),
        )
        .await
    }

    /// Set the time-to-live of a saved entity. Returns false if the key vanished.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let full_key = self.schema.full_key(key);
        with_timeout(self.timeouts.write, self.engine.expire(&full_key, ttl)).await
    }
}
