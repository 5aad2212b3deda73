//! Core domain models, errors and configuration for redtrace.
//!
//! This module contains the fundamental types that the document translation
//! and query layers are built on.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel, StorageConfig};
pub use error::{RedtraceError, Result};
pub use types::{
    DependencyLink, KeyValue, Log, Operation, OperationQueryParameters, Process, RefType, Span,
    SpanBuilder, SpanId, SpanRef, TagValue, Trace, TraceId, TraceQueryParameters, ValueType,
};
