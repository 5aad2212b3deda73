//! Compiles structured queries into filter expressions.
//!
//! Every literal is escaped here, so callers pass plain domain strings.

use super::ast::{Bound, FilterExpr, Predicate};
use super::escape::encode;
use crate::core::types::{duration_micros, epoch_micros, TraceQueryParameters};
use crate::core::Result;
use crate::document::schema::{operation_fields, span_fields};
use crate::document::translate::tag_pair;

/// Builds the span filter for a trace search.
///
/// Predicates are emitted in a fixed order: service, operation, duration,
/// tags (in key order), start time.
pub fn trace_filter(query: &TraceQueryParameters) -> Result<FilterExpr> {
    query.validate()?;

    let mut expr = FilterExpr::all().and(Predicate::text(
        span_fields::SERVICE_NAME,
        encode(&query.service_name),
    ));

    if !query.operation_name.is_empty() {
        expr = expr.and(Predicate::text(
            span_fields::OPERATION_NAME,
            encode(&query.operation_name),
        ));
    }

    if let Some(predicate) = duration_predicate(query) {
        expr = expr.and(predicate);
    }

    // An empty side has no token of its own; the pair still binds it.
    for (key, value) in &query.tags {
        if !key.is_empty() {
            expr = expr.and(Predicate::tag(span_fields::TAG_KEY, encode(key)));
        }
        if !value.is_empty() {
            expr = expr.and(Predicate::tag(span_fields::TAG_VALUE, encode(value)));
        }
        expr = expr.and(Predicate::tag(span_fields::TAG_PAIR, tag_pair(key, value)));
    }

    Ok(expr.and(Predicate::range(
        span_fields::START_TIME,
        Bound::from(epoch_micros(query.start_time_min)),
        Bound::from(epoch_micros(query.start_time_max)),
    )))
}

/// Duration range in microseconds; a zero side is open
fn duration_predicate(query: &TraceQueryParameters) -> Option<Predicate> {
    let min = duration_micros(query.duration_min);
    let max = duration_micros(query.duration_max);
    let (min, max) = match (min, max) {
        (0, 0) => return None,
        (0, max) => (Bound::NegInfinity, Bound::from(max)),
        (min, 0) => (Bound::from(min), Bound::PosInfinity),
        (min, max) => (Bound::from(min), Bound::from(max)),
    };
    Some(Predicate::range(span_fields::DURATION, min, max))
}

/// Matches every span of the given traces
pub fn trace_ids_filter<S: AsRef<str>>(trace_ids: &[S]) -> FilterExpr {
    FilterExpr::all().and(Predicate::Text {
        field: span_fields::TRACE_ID.to_string(),
        alternatives: trace_ids.iter().map(|id| encode(id.as_ref())).collect(),
    })
}

/// Matches the catalog row with the given content hash
pub fn operation_hash_filter(hash: &str) -> FilterExpr {
    FilterExpr::all().and(Predicate::tag(operation_fields::HASH, encode(hash)))
}

/// Matches the catalog rows of one service, optionally of one span kind.
///
/// An empty kind means any kind.
pub fn service_operations_filter(service: &str, span_kind: Option<&str>) -> FilterExpr {
    let expr = FilterExpr::all().and(Predicate::tag(operation_fields::SERVICE, encode(service)));
    match span_kind.filter(|kind| !kind.is_empty()) {
        Some(kind) => expr.and(Predicate::tag(operation_fields::SPAN_KIND, encode(kind))),
        None => expr,
    }
}
