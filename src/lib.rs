//! redtrace - trace storage on a document/search index engine.
//!
//! redtrace persists distributed-tracing spans as flat JSON documents in a
//! document engine with a secondary full-text index, and answers trace,
//! service and operation queries against it.
//!
//! # Features
//!
//! - **Lossless translation**: typed tags, references and logs survive a round trip
//! - **Safe queries**: every literal is escaped for the index query language
//! - **Two-phase trace search**: discover trace ids, then fetch all their spans
//! - **Operation catalog**: deduplicated (service, operation) rows with retention
//!
//! # Architecture
//!
//! - `core`: Domain models, errors and configuration
//! - `document`: Index schemas, stored documents and the translator
//! - `query`: Escaping, filter building and the query-language parser
//! - `storage`: Document engine contract, in-memory engine and repositories
//! - `spanstore`: Reader/writer contract consumed by the tracing platform
//! - `metrics`: Per-index read/write metrics
//! - `cli`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use redtrace_lib::core::StorageConfig;
//! use redtrace_lib::metrics::NoopMetrics;
//! use redtrace_lib::spanstore::TraceStore;
//! use redtrace_lib::storage::MemoryEngine;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TraceStore::open(
//!         Arc::new(MemoryEngine::new()),
//!         &StorageConfig::default(),
//!         Arc::new(NoopMetrics),
//!     )
//!     .await?;
//!     let services = store.span_reader().get_services().await?;
//!     println!("{:?}", services);
//!     store.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod document;
pub mod metrics;
pub mod query;
pub mod spanstore;
pub mod storage;

// Re-export core types for convenience
pub use crate::core::{Config, RedtraceError, Result};
pub use crate::spanstore::{DependencyReader, SpanReader, SpanWriter, TraceStore};
