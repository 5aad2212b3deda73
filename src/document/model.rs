//! Flattened JSON documents as stored in the engine.
//!
//! Searchable string fields hold escaped text (see [`crate::query::escape`]).
//! `key` and `ver` belong to the engine and are never set by the translator.

use serde::{Deserialize, Serialize};

/// Storage identity shared by every persisted document type.
pub trait Entity: Serialize + serde::de::DeserializeOwned + Default + Send + Sync {
    /// Engine-assigned key, empty until saved
    fn key(&self) -> &str;
    fn set_key(&mut self, key: String);
    /// Optimistic-concurrency version stamp, zero until saved
    fn ver(&self) -> i64;
    fn set_ver(&mut self, ver: i64);
}

macro_rules! impl_entity {
    ($ty:ty) => {
        impl Entity for $ty {
            fn key(&self) -> &str {
                &self.key
            }

            fn set_key(&mut self, key: String) {
                self.key = key;
            }

            fn ver(&self) -> i64 {
                self.ver
            }

            fn set_ver(&mut self, ver: i64) {
                self.ver = ver;
            }
        }
    };
}

/// A span as one flat, indexable JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanDocument {
    pub key: String,
    pub ver: i64,
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
    #[serde(rename = "operationName")]
    pub operation_name: String,
    pub flags: u32,
    /// Microseconds since the Unix epoch
    #[serde(rename = "startTime")]
    pub start_time: u64,
    /// Microseconds
    pub duration: u64,
    pub references: Vec<DocReference>,
    #[serde(rename = "processID")]
    pub process_id: String,
    pub process: DocProcess,
    pub tags: Vec<DocKeyValue>,
    /// Bound `key=value` tokens of the span tags, index-only
    #[serde(rename = "tagPairs")]
    pub tag_pairs: Vec<String>,
    pub logs: Vec<DocLog>,
    pub warnings: Vec<String>,
}

/// A reference in document form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocReference {
    #[serde(rename = "refType")]
    pub ref_type: String,
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
}

/// The emitting process in document form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocProcess {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    pub tags: Vec<DocKeyValue>,
}

/// A log entry in document form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocLog {
    /// Microseconds since the Unix epoch
    pub timestamp: u64,
    pub fields: Vec<DocKeyValue>,
}

/// A tag in document form.
///
/// `value` is written as a JSON string; it is kept as a raw JSON value so the
/// read path can report documents written by other producers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocKeyValue {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: serde_json::Value,
}

/// One row of the operation catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationDocument {
    pub key: String,
    pub ver: i64,
    pub service: String,
    pub operation: String,
    pub span_kind: String,
    pub hash: String,
}

impl_entity!(SpanDocument);
impl_entity!(OperationDocument);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_document_field_names() {
        let doc = SpanDocument {
            trace_id: "00000000000000ab".to_string(),
            start_time: 10,
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["traceID"], "00000000000000ab");
        assert_eq!(json["startTime"], 10);
        assert!(json.get("tagPairs").is_some());
        assert!(json["process"].get("serviceName").is_some());
    }

    #[test]
    fn test_missing_fields_default() {
        let doc: SpanDocument = serde_json::from_str(r#"{"traceID":"ab"}"#).unwrap();
        assert_eq!(doc.trace_id, "ab");
        assert!(doc.tags.is_empty());
        assert_eq!(doc.ver, 0);
    }

    #[test]
    fn test_entity_accessors() {
        let mut doc = OperationDocument::default();
        doc.set_key("01ABC".to_string());
        doc.set_ver(3);
        assert_eq!(doc.key(), "01ABC");
        assert_eq!(doc.ver(), 3);
    }
}
