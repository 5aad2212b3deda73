//! Stored document model: index schemas, document types and the translator.

pub mod model;
pub mod schema;
pub mod translate;

pub use model::{DocKeyValue, DocLog, DocProcess, DocReference, Entity, OperationDocument, SpanDocument};
pub use schema::{FieldKind, IndexSchema, SchemaField, OPERATION_SCHEMA, SPAN_SCHEMA};
pub use translate::{operation_document, operation_from_document, span_from_document, span_to_document};
