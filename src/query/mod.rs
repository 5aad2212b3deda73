//! Index query language for redtrace.
//!
//! The builder compiles structured trace queries into a small conjunctive
//! language understood by the document engine; the parser reads that
//! language back for engines evaluated in-process.

pub mod ast;
pub mod builder;
pub mod escape;
pub mod parser;

pub use ast::{Bound, FilterExpr, Predicate};
pub use builder::{operation_hash_filter, service_operations_filter, trace_filter, trace_ids_filter};
pub use escape::{decode, encode};
pub use parser::parse_filter;
