//! Index declarations for span documents and the operation catalog.
//!
//! Each [`SchemaField`] maps a JSON path inside a stored document to the flat
//! attribute name used in query expressions. The translator writes exactly
//! these paths and the filter builder queries exactly these aliases.

/// How an attribute is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Tokenized text, matched with `@f:lit` or `@f:(a|b)`
    Text,
    /// Exact categorical values, matched with `@f:{a|b}`
    Tag,
    /// Numbers, matched with `@f:[min max]`
    Numeric,
}

/// One indexed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    /// JSON path into the document; `[*]` fans out over arrays
    pub path: &'static str,
    /// Attribute name used in queries
    pub alias: &'static str,
    pub kind: FieldKind,
}

/// Declaration of one index. The index name doubles as the key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: &'static str,
    pub fields: &'static [SchemaField],
}

impl IndexSchema {
    /// Looks up a field by alias
    pub fn field(&self, alias: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    /// Prefix shared by every key of this index
    pub fn key_prefix(&self) -> String {
        format!("{}:", self.name)
    }

    /// Full engine key for an entity key
    pub fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }
}

/// Attribute names of the span index.
pub mod span_fields {
    pub const TRACE_ID: &str = "traceID";
    pub const SPAN_ID: &str = "spanID";
    pub const OPERATION_NAME: &str = "operationName";
    pub const SERVICE_NAME: &str = "processServiceName";

    pub const PROCESS_TAG_KEY: &str = "processTagKey";
    pub const PROCESS_TAG_TYPE: &str = "processTagType";
    pub const PROCESS_TAG_VALUE: &str = "processTagValue";
    pub const TAG_KEY: &str = "tagKey";
    pub const TAG_TYPE: &str = "tagType";
    pub const TAG_VALUE: &str = "tagValue";
    pub const TAG_PAIR: &str = "tagPair";
    pub const REF_TYPE: &str = "refType";
    pub const REF_TRACE_ID: &str = "refTraceID";
    pub const REF_SPAN_ID: &str = "refSpanID";
    pub const LOG_FIELD_KEY: &str = "logFieldKey";
    pub const LOG_FIELD_TYPE: &str = "logFieldType";
    pub const LOG_FIELD_VALUE: &str = "logFieldValue";

    pub const START_TIME: &str = "startTime";
    pub const DURATION: &str = "duration";
    pub const FLAGS: &str = "flags";
    pub const LOG_TIMESTAMP: &str = "logTimestamp";
}

/// Attribute names of the operation catalog index.
pub mod operation_fields {
    pub const SERVICE: &str = "service";
    pub const OPERATION: &str = "operation";
    pub const SPAN_KIND: &str = "span_kind";
    pub const HASH: &str = "hash";
}

const fn field(path: &'static str, alias: &'static str, kind: FieldKind) -> SchemaField {
    SchemaField { path, alias, kind }
}

/// Span document index.
pub const SPAN_SCHEMA: IndexSchema = IndexSchema {
    name: "spans",
    fields: &[
        field("$.traceID", span_fields::TRACE_ID, FieldKind::Text),
        field("$.spanID", span_fields::SPAN_ID, FieldKind::Text),
        field("$.operationName", span_fields::OPERATION_NAME, FieldKind::Text),
        field("$.process.serviceName", span_fields::SERVICE_NAME, FieldKind::Text),
        field("$.process.tags[*].key", span_fields::PROCESS_TAG_KEY, FieldKind::Tag),
        field("$.process.tags[*].type", span_fields::PROCESS_TAG_TYPE, FieldKind::Tag),
        field("$.process.tags[*].value", span_fields::PROCESS_TAG_VALUE, FieldKind::Tag),
        field("$.tags[*].key", span_fields::TAG_KEY, FieldKind::Tag),
        field("$.tags[*].type", span_fields::TAG_TYPE, FieldKind::Tag),
        field("$.tags[*].value", span_fields::TAG_VALUE, FieldKind::Tag),
        field("$.tagPairs[*]", span_fields::TAG_PAIR, FieldKind::Tag),
        field("$.references[*].refType", span_fields::REF_TYPE, FieldKind::Tag),
        field("$.references[*].traceID", span_fields::REF_TRACE_ID, FieldKind::Tag),
        field("$.references[*].spanID", span_fields::REF_SPAN_ID, FieldKind::Tag),
        field("$.logs[*].fields[*].key", span_fields::LOG_FIELD_KEY, FieldKind::Tag),
        field("$.logs[*].fields[*].type", span_fields::LOG_FIELD_TYPE, FieldKind::Tag),
        field("$.logs[*].fields[*].value", span_fields::LOG_FIELD_VALUE, FieldKind::Tag),
        field("$.startTime", span_fields::START_TIME, FieldKind::Numeric),
        field("$.duration", span_fields::DURATION, FieldKind::Numeric),
        field("$.flags", span_fields::FLAGS, FieldKind::Numeric),
        field("$.logs[*].timestamp", span_fields::LOG_TIMESTAMP, FieldKind::Numeric),
    ],
};

/// Operation catalog index.
pub const OPERATION_SCHEMA: IndexSchema = IndexSchema {
    name: "operations",
    fields: &[
        field("$.service", operation_fields::SERVICE, FieldKind::Tag),
        field("$.operation", operation_fields::OPERATION, FieldKind::Tag),
        field("$.span_kind", operation_fields::SPAN_KIND, FieldKind::Tag),
        field("$.hash", operation_fields::HASH, FieldKind::Tag),
    ],
};
