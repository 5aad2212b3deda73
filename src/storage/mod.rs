//! Storage layer for trace data.
//!
//! This module provides the document engine interface, an in-process engine
//! and the repositories that map spans and the operation catalog onto it.

pub mod engine;
pub mod memory;
pub mod operations;
pub mod repository;
pub mod spans;

// Re-export commonly used types
pub use engine::{
    AggregateReply, AggregateRequest, DocumentEngine, Reducer, SavedDocument, SearchReply,
    SearchRequest, SortKey, SortOrder, StoredDocument,
};
pub use memory::{EngineStats, MemoryEngine};
pub use operations::{operation_hash, OperationRepository};
pub use repository::{with_timeout, JsonRepository, Page, Timeouts};
pub use spans::{SpanRepository, MAX_FETCHED_SPANS};
