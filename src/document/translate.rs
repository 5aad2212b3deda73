//! Conversion between the tracing domain model and stored documents.
//!
//! The write direction is total. The read direction is lenient per field: a
//! tag, reference, log field or identifier that fails to parse is dropped or
//! defaulted and logged, and the rest of the span is still returned.

use super::model::{DocKeyValue, DocLog, DocProcess, DocReference, OperationDocument, SpanDocument};
use crate::core::types::{
    duration_micros, epoch_micros, from_epoch_micros, KeyValue, Log, Operation, Process, RefType,
    Span, SpanId, SpanRef, TagValue, TraceId, ValueType,
};
use crate::core::{RedtraceError, Result};
use crate::query::escape::{decode, encode};
use std::time::Duration;

/// Separator between the escaped key and value of a bound tag token.
pub const TAG_PAIR_SEPARATOR: char = '=';

/// Bound `key=value` token for a tag; `=` is reserved so it cannot occur
/// unescaped inside either half.
pub fn tag_pair(key: &str, value: &str) -> String {
    let mut pair = encode(key);
    pair.push(TAG_PAIR_SEPARATOR);
    pair.push_str(&encode(value));
    pair
}

/// Converts a span into its document form.
pub fn span_to_document(span: &Span) -> SpanDocument {
    SpanDocument {
        key: String::new(),
        ver: 0,
        trace_id: encode(&span.trace_id.to_string()),
        span_id: encode(&span.span_id.to_string()),
        operation_name: encode(&span.operation_name),
        flags: span.flags,
        start_time: epoch_micros(span.start_time),
        duration: duration_micros(span.duration),
        references: span.references.iter().map(reference_to_document).collect(),
        process_id: span.process_id.clone(),
        process: DocProcess {
            service_name: encode(&span.process.service_name),
            tags: key_values_to_document(&span.process.tags),
        },
        tags: key_values_to_document(&span.tags),
        tag_pairs: span
            .tags
            .iter()
            .map(|kv| tag_pair(&kv.key, &kv.value.to_persisted()))
            .collect(),
        logs: span
            .logs
            .iter()
            .map(|log| DocLog {
                timestamp: epoch_micros(log.timestamp),
                fields: key_values_to_document(&log.fields),
            })
            .collect(),
        warnings: span.warnings.clone(),
    }
}

/// Converts a stored document back into a span.
pub fn span_from_document(doc: &SpanDocument) -> Span {
    let trace_id = TraceId::from_hex(&decode(&doc.trace_id)).unwrap_or_else(|e| {
        tracing::warn!("span {}: defaulting unparsable trace id: {}", doc.key, e);
        TraceId::default()
    });
    let span_id = SpanId::from_hex(&decode(&doc.span_id)).unwrap_or_else(|e| {
        tracing::warn!("span {}: defaulting unparsable span id: {}", doc.key, e);
        SpanId::default()
    });

    let references = doc
        .references
        .iter()
        .filter_map(|r| match reference_from_document(r) {
            Ok(reference) => Some(reference),
            Err(e) => {
                tracing::warn!("span {}: dropping reference: {}", doc.key, e);
                None
            },
        })
        .collect();

    Span {
        trace_id,
        span_id,
        operation_name: decode(&doc.operation_name),
        references,
        flags: doc.flags,
        start_time: from_epoch_micros(doc.start_time),
        duration: Duration::from_micros(doc.duration),
        tags: key_values_from_document(&doc.tags),
        logs: doc
            .logs
            .iter()
            .map(|log| Log {
                timestamp: from_epoch_micros(log.timestamp),
                fields: key_values_from_document(&log.fields),
            })
            .collect(),
        process_id: doc.process_id.clone(),
        process: Process {
            service_name: decode(&doc.process.service_name),
            tags: key_values_from_document(&doc.process.tags),
        },
        warnings: doc.warnings.clone(),
    }
}

pub fn reference_to_document(reference: &SpanRef) -> DocReference {
    DocReference {
        ref_type: reference.ref_type.as_str().to_string(),
        trace_id: reference.trace_id.to_string(),
        span_id: reference.span_id.to_string(),
    }
}

pub fn reference_from_document(doc: &DocReference) -> Result<SpanRef> {
    Ok(SpanRef {
        ref_type: doc.ref_type.parse::<RefType>()?,
        trace_id: TraceId::from_hex(&doc.trace_id)?,
        span_id: SpanId::from_hex(&doc.span_id)?,
    })
}

pub fn key_value_to_document(kv: &KeyValue) -> DocKeyValue {
    DocKeyValue {
        key: encode(&kv.key),
        value_type: kv.value_type().as_str().to_string(),
        value: serde_json::Value::String(encode(&kv.value.to_persisted())),
    }
}

pub fn key_values_to_document(kvs: &[KeyValue]) -> Vec<DocKeyValue> {
    kvs.iter().map(key_value_to_document).collect()
}

/// Rebuilds one typed tag; the discriminant decides how the value parses.
pub fn key_value_from_document(doc: &DocKeyValue) -> Result<KeyValue> {
    let raw = match &doc.value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => {
            return Err(RedtraceError::translation(format!(
                "invalid nil value for tag '{}'",
                doc.key
            )))
        },
        other => {
            return Err(RedtraceError::translation(format!(
                "non-string value {} for tag '{}'",
                other, doc.key
            )))
        },
    };
    let value_type = doc.value_type.parse::<ValueType>()?;
    let value = TagValue::from_persisted(value_type, &decode(raw))?;
    Ok(KeyValue::new(decode(&doc.key), value))
}

/// Rebuilds a tag list, dropping the entries that fail to convert.
pub fn key_values_from_document(docs: &[DocKeyValue]) -> Vec<KeyValue> {
    docs.iter()
        .filter_map(|doc| match key_value_from_document(doc) {
            Ok(kv) => Some(kv),
            Err(e) => {
                tracing::warn!("dropping tag: {}", e);
                None
            },
        })
        .collect()
}

/// Builds the catalog row for a span's (service, operation) pair.
pub fn operation_document(span: &Span, hash: String) -> OperationDocument {
    OperationDocument {
        key: String::new(),
        ver: 0,
        service: encode(span.service_name()),
        operation: encode(&span.operation_name),
        span_kind: encode(&span.span_kind()),
        hash,
    }
}

pub fn operation_from_document(doc: &OperationDocument) -> Operation {
    Operation {
        name: decode(&doc.operation),
        span_kind: decode(&doc.span_kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn sample_span() -> Span {
        let trace_id = TraceId::new(0x1, 0xabc);
        Span::builder()
            .trace_id(trace_id)
            .span_id(SpanId(0x42))
            .service_name("checkout, v2")
            .operation_name("POST /charge")
            .start_time(UNIX_EPOCH + Duration::from_micros(1_700_000_000_000_001))
            .duration(Duration::from_micros(1500))
            .flags(1)
            .child_of(trace_id, SpanId(0x41))
            .reference(SpanRef {
                ref_type: RefType::FollowsFrom,
                trace_id: TraceId::new(0, 7),
                span_id: SpanId(8),
            })
            .tag(KeyValue::string("http.url", "https://shop/charge?id=1"))
            .tag(KeyValue::int64("retries", 42))
            .tag(KeyValue::bool("error", false))
            .tag(KeyValue::float64("ratio", 0.5))
            .tag(KeyValue::binary("payload", vec![0xca, 0xfe]))
            .process_id("p1")
            .process_tag(KeyValue::string("hostname", "node-1"))
            .log(Log {
                timestamp: UNIX_EPOCH + Duration::from_micros(1_700_000_000_000_500),
                fields: vec![KeyValue::string("event", "retry: timeout")],
            })
            .warning("clock skew adjusted")
            .build()
            .unwrap()
    }

    #[test]
    fn test_span_round_trip() {
        let span = sample_span();
        let doc = span_to_document(&span);
        assert_eq!(span_from_document(&doc), span);
    }

    #[test]
    fn test_document_values_are_escaped() {
        let doc = span_to_document(&sample_span());
        assert_eq!(doc.process.service_name, "checkout\\,\\ v2");
        assert_eq!(doc.operation_name, "POST\\ \\/charge");
        assert_eq!(doc.tags[0].key, "http\\.url");
        assert_eq!(doc.tags[1].value_type, "int64");
        assert_eq!(doc.tags[1].value, serde_json::Value::String("42".to_string()));
        assert_eq!(doc.tags[4].value, serde_json::Value::String("cafe".to_string()));
        assert_eq!(doc.tag_pairs[1], "retries=42");
        assert_eq!(doc.start_time, 1_700_000_000_000_001);
        assert_eq!(doc.duration, 1500);
        assert_eq!(doc.references[0].ref_type, "CHILD_OF");
        assert_eq!(doc.logs[0].timestamp, 1_700_000_000_000_500);
    }

    #[test]
    fn test_int64_tag_keeps_its_type() {
        let doc = span_to_document(&sample_span());
        let span = span_from_document(&doc);
        assert_eq!(span.tag("retries").unwrap().value, TagValue::Int64(42));
    }

    #[test]
    fn test_bad_tags_are_dropped_individually() {
        let mut doc = span_to_document(&sample_span());
        doc.tags[0].value = serde_json::Value::Null;
        doc.tags[1].value_type = "decimal".to_string();
        doc.tags[2].value = serde_json::json!(true);
        doc.tags[3].value = serde_json::Value::String("not-a-float".to_string());

        let span = span_from_document(&doc);
        assert_eq!(span.tags.len(), 1);
        assert_eq!(span.tags[0].key, "payload");
        assert_eq!(span.operation_name, "POST /charge");
    }

    #[test]
    fn test_bad_reference_is_dropped_and_bad_id_defaulted() {
        let mut doc = span_to_document(&sample_span());
        doc.references[0].ref_type = "PARENT".to_string();
        doc.span_id = "zz".to_string();

        let span = span_from_document(&doc);
        assert_eq!(span.references.len(), 1);
        assert_eq!(span.references[0].ref_type, RefType::FollowsFrom);
        assert_eq!(span.span_id, SpanId::default());
        assert_eq!(span.trace_id, TraceId::new(0x1, 0xabc));
    }

    #[test]
    fn test_operation_document() {
        let span = Span::builder()
            .trace_id(TraceId::new(0, 1))
            .span_id(SpanId(1))
            .service_name("checkout")
            .operation_name("charge.card")
            .tag(KeyValue::string("span.kind", "server"))
            .start_time(SystemTime::now())
            .build()
            .unwrap();
        let doc = operation_document(&span, "00000000000000ff".to_string());
        assert_eq!(doc.operation, "charge\\.card");
        assert_eq!(doc.span_kind, "server");
        assert_eq!(
            operation_from_document(&doc),
            Operation {
                name: "charge.card".to_string(),
                span_kind: "server".to_string(),
            }
        );
    }

    #[test]
    fn test_tag_pair_is_unambiguous() {
        assert_eq!(tag_pair("a=b", "c"), "a\\=b=c");
        assert_ne!(tag_pair("a=b", "c"), tag_pair("a", "b=c"));
    }
}
