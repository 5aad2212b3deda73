//! In-memory document engine.
//!
//! Holds JSON documents per index, evaluates the query language against the
//! values selected by each index schema and honors per-key expiry. Expired
//! documents are invisible to every read and are purged on the next write.

use super::engine::{
    AggregateReply, AggregateRequest, DocumentEngine, SavedDocument, SearchReply, SearchRequest,
    SortKey, SortOrder, StoredDocument,
};
use crate::core::{RedtraceError, Result};
use crate::document::{FieldKind, IndexSchema, SchemaField};
use crate::query::{parse_filter, FilterExpr, Predicate};
use ahash::AHashMap;
use parking_lot::RwLock;
use rand::RngCore;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

/// One stored document with its version stamp and deadline.
#[derive(Debug, Clone)]
struct Entry {
    ver: i64,
    body: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

#[derive(Debug, Default)]
struct EngineState {
    schemas: AHashMap<String, IndexSchema>,
    /// Full key to entry; ordered so index scans are prefix ranges
    documents: BTreeMap<String, Entry>,
    closed: bool,
}

impl EngineState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(RedtraceError::store("engine is closed"));
        }
        Ok(())
    }

    fn schema(&self, index: &str) -> Result<&IndexSchema> {
        self.schemas
            .get(index)
            .ok_or_else(|| RedtraceError::store(format!("unknown index '{}'", index)))
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.documents.len();
        self.documents.retain(|_, entry| entry.is_live(now));
        before - self.documents.len()
    }

    /// Live documents of an index as `(key without prefix, entry)`
    fn live_documents(
        &self,
        schema: &IndexSchema,
        now: Instant,
    ) -> impl Iterator<Item = (&str, &Entry)> + '_ {
        let prefix = schema.key_prefix();
        let offset = prefix.len();
        self.documents
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .filter(move |(_, entry)| entry.is_live(now))
            .map(move |(key, entry)| (&key[offset..], entry))
    }
}

/// Engine activity counters.
#[derive(Debug, Default)]
struct EngineCounters {
    saves: AtomicU64,
    searches: AtomicU64,
    aggregates: AtomicU64,
    purged: AtomicU64,
}

/// Snapshot of engine activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub documents: usize,
    pub saves: u64,
    pub searches: u64,
    pub aggregates: u64,
    pub purged: u64,
}

/// A predicate bound to the schema field it reads.
struct BoundPredicate<'a> {
    field: &'a SchemaField,
    predicate: &'a Predicate,
}

/// In-memory [`DocumentEngine`].
///
/// Text fields match whole values case-insensitively. There is no
/// tokenizing or prefix matching, so a text literal must equal a stored value.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: RwLock<EngineState>,
    counters: EngineCounters,
}

impl MemoryEngine {
    /// Create an empty engine with no indices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activity counters and the number of live documents.
    pub fn stats(&self) -> EngineStats {
        let now = Instant::now();
        let state = self.state.read();
        EngineStats {
            documents: state.documents.values().filter(|e| e.is_live(now)).count(),
            saves: self.counters.saves.load(AtomicOrdering::Relaxed),
            searches: self.counters.searches.load(AtomicOrdering::Relaxed),
            aggregates: self.counters.aggregates.load(AtomicOrdering::Relaxed),
            purged: self.counters.purged.load(AtomicOrdering::Relaxed),
        }
    }

    fn purge(&self, state: &mut EngineState) {
        let purged = state.purge_expired(Instant::now());
        if purged > 0 {
            self.counters.purged.fetch_add(purged as u64, AtomicOrdering::Relaxed);
            tracing::debug!("purged {} expired documents", purged);
        }
    }
}

fn new_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Resolves each predicate to its schema field and checks the operator fits.
fn bind<'a>(schema: &'a IndexSchema, expr: &'a FilterExpr) -> Result<Vec<BoundPredicate<'a>>> {
    expr.predicates
        .iter()
        .map(|predicate| {
            let field = schema.field(predicate.field()).ok_or_else(|| {
                RedtraceError::parse(format!(
                    "unknown field '{}' in index '{}'",
                    predicate.field(),
                    schema.name
                ))
            })?;
            let expected = match predicate {
                Predicate::Text { .. } => FieldKind::Text,
                Predicate::Tag { .. } => FieldKind::Tag,
                Predicate::Range { .. } => FieldKind::Numeric,
            };
            if field.kind != expected {
                return Err(RedtraceError::parse(format!(
                    "field '{}' is {:?}, not {:?}",
                    field.alias, field.kind, expected
                )));
            }
            Ok(BoundPredicate { field, predicate })
        })
        .collect()
}

/// Values selected by a `$.a.b[*].c` path, rendered as strings.
fn extract(body: &Value, path: &str) -> Vec<String> {
    let mut current: Vec<&Value> = vec![body];
    let segments = path.trim_start_matches('$').trim_start_matches('.');

    for segment in segments.split('.').filter(|s| !s.is_empty()) {
        let (name, fan_out) = match segment.strip_suffix("[*]") {
            Some(name) => (name, true),
            None => (segment, false),
        };
        current = current
            .into_iter()
            .filter_map(|v| v.get(name))
            .flat_map(|v| match v {
                Value::Array(items) if fan_out => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .collect();
    }

    let mut values = Vec::with_capacity(current.len());
    for value in current {
        scalar_strings(value, &mut values);
    }
    values
}

fn scalar_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|item| scalar_strings(item, out)),
        Value::Null | Value::Object(_) => {},
    }
}

fn any_equal(values: &[String], candidates: &[String]) -> bool {
    values.iter().any(|value| {
        let value = value.to_lowercase();
        candidates.iter().any(|c| c.to_lowercase() == value)
    })
}

fn matches_all(body: &Value, predicates: &[BoundPredicate<'_>]) -> bool {
    predicates.iter().all(|bound| {
        let values = extract(body, bound.field.path);
        match bound.predicate {
            Predicate::Text { alternatives, .. } => any_equal(&values, alternatives),
            Predicate::Tag { values: wanted, .. } => any_equal(&values, wanted),
            Predicate::Range { min, max, .. } => {
                let (min, max) = (min.as_f64(), max.as_f64());
                values
                    .iter()
                    .filter_map(|v| v.parse::<f64>().ok())
                    .any(|v| v >= min && v <= max)
            },
        }
    })
}

/// Orders row values by the kind of their property.
///
/// Numeric properties compare as numbers; group values compare as strings
/// so hex ids such as `1e0` never read as floats.
fn compare_values(a: Option<&String>, b: Option<&String>, numeric: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if numeric => {
            let parse = |v: &String| v.parse::<f64>().ok();
            match (parse(a), parse(b)) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (x, y) => x.is_some().cmp(&y.is_some()).then_with(|| a.cmp(b)),
            }
        },
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn compare_rows(
    a: &BTreeMap<String, String>,
    b: &BTreeMap<String, String>,
    sort_by: &[SortKey],
    numeric: &[&str],
) -> Ordering {
    for key in sort_by {
        let is_numeric = numeric.contains(&key.property.as_str());
        let ordering = compare_values(a.get(&key.property), b.get(&key.property), is_numeric);
        let ordering = match key.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !text.starts_with(first) || text.len() < first.len() + last.len() || !text.ends_with(last) {
        return false;
    }

    let mut rest = &text[first.len()..text.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[async_trait::async_trait]
impl DocumentEngine for MemoryEngine {
    async fn create_index(&self, schema: &IndexSchema) -> Result<bool> {
        let mut state = self.state.write();
        state.ensure_open()?;
        if state.schemas.contains_key(schema.name) {
            return Ok(false);
        }
        state.schemas.insert(schema.name.to_string(), *schema);
        Ok(true)
    }

    async fn save(
        &self,
        index: &str,
        key: Option<&str>,
        ver: i64,
        body: Value,
    ) -> Result<SavedDocument> {
        let mut state = self.state.write();
        state.ensure_open()?;
        self.purge(&mut state);
        let schema = *state.schema(index)?;

        let key = match key {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => new_id(),
        };
        let full_key = schema.full_key(&key);

        let (current, expires_at) = state
            .documents
            .get(&full_key)
            .map_or((0, None), |entry| (entry.ver, entry.expires_at));
        if current != ver {
            return Err(RedtraceError::VersionConflict {
                key: full_key,
                expected: ver,
                actual: current,
            });
        }

        let ver = current + 1;
        state.documents.insert(full_key, Entry { ver, body, expires_at });
        self.counters.saves.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(SavedDocument { key, ver })
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchReply> {
        let state = self.state.read();
        state.ensure_open()?;
        let schema = state.schema(index)?;
        let expr = parse_filter(&request.query)?;
        let predicates = bind(schema, &expr)?;
        self.counters.searches.fetch_add(1, AtomicOrdering::Relaxed);

        let now = Instant::now();
        let mut total = 0;
        let mut documents = Vec::new();
        for (key, entry) in state.live_documents(schema, now) {
            if !matches_all(&entry.body, &predicates) {
                continue;
            }
            if total >= request.offset && documents.len() < request.limit {
                documents.push(StoredDocument {
                    key: key.to_string(),
                    ver: entry.ver,
                    body: entry.body.clone(),
                });
            }
            total += 1;
        }

        Ok(SearchReply { total, documents })
    }

    async fn aggregate(&self, index: &str, request: &AggregateRequest) -> Result<AggregateReply> {
        let state = self.state.read();
        state.ensure_open()?;
        let schema = state.schema(index)?;
        let expr = parse_filter(&request.query)?;
        let predicates = bind(schema, &expr)?;

        let group_alias = request.group_by.trim_start_matches('@');
        let group_field = schema.field(group_alias).ok_or_else(|| {
            RedtraceError::parse(format!("unknown group-by field '{}'", request.group_by))
        })?;
        let count_alias = request.reducer.alias();
        if let Some(unknown) = request
            .sort_by
            .iter()
            .find(|k| k.property.trim_start_matches('@') != group_alias && k.property != count_alias)
        {
            return Err(RedtraceError::parse(format!(
                "cannot sort by '{}': not a group or reducer property",
                unknown.property
            )));
        }
        self.counters.aggregates.fetch_add(1, AtomicOrdering::Relaxed);

        let now = Instant::now();
        let mut groups: AHashMap<String, u64> = AHashMap::new();
        for (_, entry) in state.live_documents(schema, now) {
            if !matches_all(&entry.body, &predicates) {
                continue;
            }
            if let Some(value) = extract(&entry.body, group_field.path).into_iter().next() {
                *groups.entry(value).or_insert(0) += 1;
            }
        }

        let mut rows: Vec<BTreeMap<String, String>> = groups
            .into_iter()
            .map(|(value, count)| {
                BTreeMap::from([
                    (group_alias.to_string(), value),
                    (count_alias.to_string(), count.to_string()),
                ])
            })
            .collect();
        let sort_by: Vec<SortKey> = request
            .sort_by
            .iter()
            .map(|k| SortKey {
                property: k.property.trim_start_matches('@').to_string(),
                order: k.order,
            })
            .collect();
        let mut numeric = vec![count_alias];
        if group_field.kind == FieldKind::Numeric {
            numeric.push(group_alias);
        }
        rows.sort_by(|a, b| compare_rows(a, b, &sort_by, &numeric));

        let total = rows.len();
        rows.truncate(request.limit);
        Ok(AggregateReply { total, rows })
    }

    async fn expire(&self, full_key: &str, ttl: Duration) -> Result<bool> {
        let mut state = self.state.write();
        state.ensure_open()?;
        self.purge(&mut state);

        if ttl.is_zero() {
            return Ok(state.documents.remove(full_key).is_some());
        }
        match state.documents.get_mut(full_key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn delete(&self, full_key: &str) -> Result<bool> {
        let mut state = self.state.write();
        state.ensure_open()?;
        self.purge(&mut state);
        Ok(state.documents.remove(full_key).is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let state = self.state.read();
        state.ensure_open()?;
        let now = Instant::now();
        Ok(state
            .documents
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        state.closed = true;
        state.documents.clear();
        state.schemas.clear();
        tracing::debug!("memory engine closed");
        Ok(())
    }
}
