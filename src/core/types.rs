//! Tracing domain model: spans, tags, references, logs and queries.

use crate::core::error::{RedtraceError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Name of the span tag that carries the span kind.
pub const SPAN_KIND_TAG: &str = "span.kind";

/// 128-bit trace identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId {
    /// Upper 64 bits
    pub high: u64,
    /// Lower 64 bits
    pub low: u64,
}

/// 64-bit span identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(pub u64);

fn parse_hex_u64(s: &str) -> Result<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RedtraceError::translation(format!("'{}' is not a hex number", s)));
    }
    u64::from_str_radix(s, 16)
        .map_err(|e| RedtraceError::translation(format!("cannot parse '{}' as hex: {}", s, e)))
}

impl TraceId {
    /// Creates a trace ID from its two halves
    pub fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// Parses the hex text form (1 to 32 hex digits)
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() > 32 {
            return Err(RedtraceError::translation(format!(
                "TraceID cannot exceed 32 hex characters, got {}",
                s.len()
            )));
        }
        if s.len() > 16 {
            // Validate before slicing so a multi-byte character can't split.
            if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(RedtraceError::translation(format!("'{}' is not a hex number", s)));
            }
            let split = s.len() - 16;
            Ok(Self::new(parse_hex_u64(&s[..split])?, parse_hex_u64(&s[split..])?))
        } else {
            Ok(Self::new(0, parse_hex_u64(s)?))
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{:016x}", self.low)
        } else {
            write!(f, "{:016x}{:016x}", self.high, self.low)
        }
    }
}

impl FromStr for TraceId {
    type Err = RedtraceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl SpanId {
    /// Parses the hex text form (1 to 16 hex digits)
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() > 16 {
            return Err(RedtraceError::translation(format!(
                "SpanID cannot exceed 16 hex characters, got {}",
                s.len()
            )));
        }
        parse_hex_u64(s).map(SpanId)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = RedtraceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

macro_rules! hex_id_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                <$ty>::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id_serde!(TraceId);
hex_id_serde!(SpanId);

/// Discriminant of a tag value, persisted next to the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Bool,
    Int64,
    Float64,
    Binary,
}

impl ValueType {
    /// Persisted name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Int64 => "int64",
            ValueType::Float64 => "float64",
            ValueType::Binary => "binary",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = RedtraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(ValueType::String),
            "bool" => Ok(ValueType::Bool),
            "int64" => Ok(ValueType::Int64),
            "float64" => Ok(ValueType::Float64),
            "binary" => Ok(ValueType::Binary),
            other => Err(RedtraceError::translation(format!(
                "not a valid ValueType string {}",
                other
            ))),
        }
    }
}

/// Typed tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TagValue {
    String(String),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Binary(Vec<u8>),
}

impl TagValue {
    /// Discriminant of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            TagValue::String(_) => ValueType::String,
            TagValue::Bool(_) => ValueType::Bool,
            TagValue::Int64(_) => ValueType::Int64,
            TagValue::Float64(_) => ValueType::Float64,
            TagValue::Binary(_) => ValueType::Binary,
        }
    }

    /// String representation used for persistence. Binary is lowercase hex.
    pub fn to_persisted(&self) -> String {
        match self {
            TagValue::String(s) => s.clone(),
            TagValue::Bool(b) => b.to_string(),
            TagValue::Int64(i) => i.to_string(),
            TagValue::Float64(v) => v.to_string(),
            TagValue::Binary(bytes) => hex::encode(bytes),
        }
    }

    /// Re-parses a persisted string according to `value_type`.
    pub fn from_persisted(value_type: ValueType, raw: &str) -> Result<Self> {
        let invalid = |e: &dyn fmt::Display| {
            RedtraceError::translation(format!("cannot parse '{}' as {}: {}", raw, value_type, e))
        };
        Ok(match value_type {
            ValueType::String => TagValue::String(raw.to_string()),
            ValueType::Bool => TagValue::Bool(raw.parse().map_err(|e| invalid(&e))?),
            ValueType::Int64 => TagValue::Int64(raw.parse().map_err(|e| invalid(&e))?),
            ValueType::Float64 => TagValue::Float64(raw.parse().map_err(|e| invalid(&e))?),
            ValueType::Binary => TagValue::Binary(hex::decode(raw).map_err(|e| invalid(&e))?),
        })
    }
}

/// A typed key/value pair used for tags, process tags and log fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(flatten)]
    pub value: TagValue,
}

impl KeyValue {
    pub fn new<K: Into<String>>(key: K, value: TagValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn string<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::new(key, TagValue::String(value.into()))
    }

    pub fn bool<K: Into<String>>(key: K, value: bool) -> Self {
        Self::new(key, TagValue::Bool(value))
    }

    pub fn int64<K: Into<String>>(key: K, value: i64) -> Self {
        Self::new(key, TagValue::Int64(value))
    }

    pub fn float64<K: Into<String>>(key: K, value: f64) -> Self {
        Self::new(key, TagValue::Float64(value))
    }

    pub fn binary<K: Into<String>>(key: K, value: Vec<u8>) -> Self {
        Self::new(key, TagValue::Binary(value))
    }

    /// Discriminant of the value
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

/// Kind of a reference from one span to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefType {
    ChildOf,
    FollowsFrom,
}

impl RefType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefType::ChildOf => "CHILD_OF",
            RefType::FollowsFrom => "FOLLOWS_FROM",
        }
    }
}

impl FromStr for RefType {
    type Err = RedtraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CHILD_OF" => Ok(RefType::ChildOf),
            "FOLLOWS_FROM" => Ok(RefType::FollowsFrom),
            other => Err(RedtraceError::translation(format!(
                "not a valid SpanRefType string {}",
                other
            ))),
        }
    }
}

/// Weak pointer to another span, which may never have been ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRef {
    pub ref_type: RefType,
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

/// The process that emitted a span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub service_name: String,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

/// A timestamped structured log entry on a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub timestamp: SystemTime,
    #[serde(default)]
    pub fields: Vec<KeyValue>,
}

/// Represents a single span in a distributed trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub operation_name: String,
    #[serde(default)]
    pub references: Vec<SpanRef>,
    #[serde(default)]
    pub flags: u32,
    pub start_time: SystemTime,
    pub duration: Duration,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
    #[serde(default)]
    pub logs: Vec<Log>,
    #[serde(default)]
    pub process_id: String,
    pub process: Process,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Span {
    /// Creates a new span builder
    pub fn builder() -> SpanBuilder {
        SpanBuilder::default()
    }

    /// Name of the emitting service
    pub fn service_name(&self) -> &str {
        &self.process.service_name
    }

    /// Looks up a span tag by key
    pub fn tag(&self, key: &str) -> Option<&KeyValue> {
        self.tags.iter().find(|kv| kv.key == key)
    }

    /// String form of the `span.kind` tag, empty when absent
    pub fn span_kind(&self) -> String {
        self.tag(SPAN_KIND_TAG)
            .map(|kv| kv.value.to_persisted())
            .unwrap_or_default()
    }
}

/// Builder for creating Span instances
#[derive(Default)]
pub struct SpanBuilder {
    trace_id: Option<TraceId>,
    span_id: Option<SpanId>,
    operation_name: Option<String>,
    references: Vec<SpanRef>,
    flags: u32,
    start_time: Option<SystemTime>,
    duration: Option<Duration>,
    tags: Vec<KeyValue>,
    logs: Vec<Log>,
    process_id: String,
    service_name: Option<String>,
    process_tags: Vec<KeyValue>,
    warnings: Vec<String>,
}

impl SpanBuilder {
    pub fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn span_id(mut self, span_id: SpanId) -> Self {
        self.span_id = Some(span_id);
        self
    }

    pub fn operation_name<S: Into<String>>(mut self, operation_name: S) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn service_name<S: Into<String>>(mut self, service_name: S) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn child_of(mut self, trace_id: TraceId, span_id: SpanId) -> Self {
        self.references.push(SpanRef {
            ref_type: RefType::ChildOf,
            trace_id,
            span_id,
        });
        self
    }

    pub fn reference(mut self, reference: SpanRef) -> Self {
        self.references.push(reference);
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn tag(mut self, tag: KeyValue) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn process_tag(mut self, tag: KeyValue) -> Self {
        self.process_tags.push(tag);
        self
    }

    pub fn process_id<S: Into<String>>(mut self, process_id: S) -> Self {
        self.process_id = process_id.into();
        self
    }

    pub fn log(mut self, log: Log) -> Self {
        self.logs.push(log);
        self
    }

    pub fn warning<S: Into<String>>(mut self, warning: S) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn build(self) -> Result<Span> {
        Ok(Span {
            trace_id: self
                .trace_id
                .ok_or_else(|| RedtraceError::invalid_query("trace_id is required"))?,
            span_id: self
                .span_id
                .ok_or_else(|| RedtraceError::invalid_query("span_id is required"))?,
            operation_name: self
                .operation_name
                .ok_or_else(|| RedtraceError::invalid_query("operation_name is required"))?,
            references: self.references,
            flags: self.flags,
            start_time: self.start_time.unwrap_or_else(SystemTime::now),
            duration: self.duration.unwrap_or(Duration::ZERO),
            tags: self.tags,
            logs: self.logs,
            process_id: self.process_id,
            process: Process {
                service_name: self
                    .service_name
                    .ok_or_else(|| RedtraceError::invalid_query("service_name is required"))?,
                tags: self.process_tags,
            },
            warnings: self.warnings,
        })
    }
}

/// All spans sharing one trace identifier, assembled on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: TraceId,
    pub spans: Vec<Span>,
}

impl Trace {
    /// Creates a trace from its spans
    pub fn from_spans(trace_id: TraceId, spans: Vec<Span>) -> Self {
        Self { trace_id, spans }
    }

    /// Returns the list of unique service names in this trace
    pub fn service_names(&self) -> Vec<&str> {
        let mut services: Vec<_> = self.spans.iter().map(Span::service_name).collect();
        services.sort_unstable();
        services.dedup();
        services
    }
}

/// Structured trace search.
///
/// A zero `duration_min` or `duration_max` leaves that side of the duration
/// range open.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceQueryParameters {
    pub service_name: String,
    pub operation_name: String,
    pub tags: BTreeMap<String, String>,
    pub start_time_min: SystemTime,
    pub start_time_max: SystemTime,
    pub duration_min: Duration,
    pub duration_max: Duration,
    pub num_traces: usize,
}

impl TraceQueryParameters {
    /// Default result cap
    pub const DEFAULT_NUM_TRACES: usize = 20;

    /// Query for a service within a start-time window
    pub fn new<S: Into<String>>(service_name: S, start_time_min: SystemTime, start_time_max: SystemTime) -> Self {
        Self {
            service_name: service_name.into(),
            operation_name: String::new(),
            tags: BTreeMap::new(),
            start_time_min,
            start_time_max,
            duration_min: Duration::ZERO,
            duration_max: Duration::ZERO,
            num_traces: Self::DEFAULT_NUM_TRACES,
        }
    }

    pub fn operation<S: Into<String>>(mut self, operation_name: S) -> Self {
        self.operation_name = operation_name.into();
        self
    }

    pub fn tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn durations(mut self, min: Duration, max: Duration) -> Self {
        self.duration_min = min;
        self.duration_max = max;
        self
    }

    pub fn limit(mut self, num_traces: usize) -> Self {
        self.num_traces = num_traces;
        self
    }

    /// Rejects queries the filter builder cannot compile meaningfully
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(RedtraceError::invalid_query("service name must be set"));
        }
        if self.start_time_min > self.start_time_max {
            return Err(RedtraceError::invalid_query(
                "start time minimum is after the start time maximum",
            ));
        }
        if !self.duration_min.is_zero()
            && !self.duration_max.is_zero()
            && self.duration_min > self.duration_max
        {
            return Err(RedtraceError::invalid_query(
                "duration minimum is above the duration maximum",
            ));
        }
        if self.num_traces == 0 {
            return Err(RedtraceError::invalid_query("num_traces must be at least 1"));
        }
        Ok(())
    }
}

/// Lookup of the operations recorded for one service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationQueryParameters {
    pub service_name: String,
    /// Only return operations of this span kind
    pub span_kind: Option<String>,
}

impl OperationQueryParameters {
    pub fn new<S: Into<String>>(service_name: S) -> Self {
        Self {
            service_name: service_name.into(),
            span_kind: None,
        }
    }
}

/// An operation observed for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub span_kind: String,
}

/// Caller/callee edge between two services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLink {
    pub parent: String,
    pub child: String,
    pub call_count: u64,
}

/// Microseconds since the Unix epoch; times before the epoch clamp to zero.
pub fn epoch_micros(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(duration_micros)
        .unwrap_or(0)
}

/// Inverse of [`epoch_micros`]
pub fn from_epoch_micros(micros: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_micros(micros)
}

/// Whole microseconds of a duration, saturating at `u64::MAX`.
pub fn duration_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
