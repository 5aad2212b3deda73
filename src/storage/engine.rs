//! Document engine contract.
//!
//! A document engine stores JSON documents under `"{index}:{id}"` keys,
//! indexes them according to an [`IndexSchema`] and answers queries written
//! in the language of [`crate::query`].

use crate::core::Result;
use crate::document::IndexSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Paged full-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub offset: usize,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new<S: Into<String>>(query: S, limit: usize) -> Self {
        Self {
            query: query.into(),
            offset: 0,
            limit,
        }
    }
}

/// A document as returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Entity key without the index prefix
    pub key: String,
    pub ver: i64,
    pub body: serde_json::Value,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchReply {
    /// Matches before paging
    pub total: usize,
    pub documents: Vec<StoredDocument>,
}

/// Reduction applied to each group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reducer {
    /// Number of documents in the group, reported under `alias`
    Count { alias: String },
}

impl Reducer {
    pub fn alias(&self) -> &str {
        match self {
            Reducer::Count { alias } => alias,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sort key over a group property or reducer alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub property: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc<S: Into<String>>(property: S) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc<S: Into<String>>(property: S) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Group-by aggregation over the documents matching `query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRequest {
    pub query: String,
    /// Attribute to group by
    pub group_by: String,
    pub reducer: Reducer,
    /// Applied in order; later keys break ties of earlier ones
    pub sort_by: Vec<SortKey>,
    /// Maximum number of rows returned
    pub limit: usize,
}

/// Aggregation result rows, each mapping property name to its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReply {
    /// Number of groups before the limit
    pub total: usize,
    pub rows: Vec<BTreeMap<String, String>>,
}

/// Identity assigned by a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    pub key: String,
    pub ver: i64,
}

/// Trait for document engine implementations.
#[async_trait::async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Declare an index. Returns false when it already existed.
    async fn create_index(&self, schema: &IndexSchema) -> Result<bool>;

    /// Insert or update a document.
    ///
    /// Without a key a new one is generated. A new document must be saved with
    /// `ver == 0`; an existing one with its current version. The stored
    /// version is incremented on success.
    async fn save(
        &self,
        index: &str,
        key: Option<&str>,
        ver: i64,
        body: serde_json::Value,
    ) -> Result<SavedDocument>;

    /// Search an index.
    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchReply>;

    /// Group, reduce, sort and limit the matches of a query.
    async fn aggregate(&self, index: &str, request: &AggregateRequest) -> Result<AggregateReply>;

    /// Set a time-to-live on a full key. Returns false if the key is absent.
    async fn expire(&self, full_key: &str, ttl: Duration) -> Result<bool>;

    /// Delete a full key. Returns false if the key is absent.
    async fn delete(&self, full_key: &str) -> Result<bool>;

    /// List full keys matching a glob where `*` matches any run of characters.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Release the engine. Every later call fails.
    async fn close(&self) -> Result<()>;
}
