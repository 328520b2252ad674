//! In-memory [`DocumentStore`] for tests and embedded use.
//!
//! Evaluates the query DSL subset the adapter emits: `bool` with
//! `must`/`should`/`filter`, `term` (with `case_insensitive`), `match`
//! (with `operator: and`), `knn` over the `embedding` field, plus
//! `sort` and `size`. Scoring for knn is cosine similarity against the
//! stored vector. Not a general search engine; unsupported clauses
//! simply match nothing.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::embedding::cosine_similarity;
use crate::store::{BulkItemResult, BulkOp, BulkResponse, DocumentStore, StoreError};

#[derive(Default)]
struct State {
    /// index name -> (doc id -> source), id-ordered for determinism.
    indices: HashMap<String, BTreeMap<String, Value>>,
    /// template name -> body.
    templates: HashMap<String, Value>,
}

/// A process-local document store.
#[derive(Default)]
pub struct MemoryStore {
    state: parking_lot::RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in an index, 0 if it does not exist.
    pub fn doc_count(&self, index: &str) -> usize {
        self.state
            .read()
            .indices
            .get(index)
            .map(|d| d.len())
            .unwrap_or(0)
    }

    /// Names of all existing indices, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().indices.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Match an index pattern against a concrete name. `*` matches any
/// substring, which covers the `prefix-*` patterns the adapter uses.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = name;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Resolve a possibly dotted field path against a document.
///
/// Promoted metadata fields are written flat ("meta_kw.order_id" is a
/// literal key), so the flat key is checked before walking nested
/// objects.
fn lookup_field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = doc.get(path) {
        return Some(value);
    }
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches_term(doc: &Value, field: &str, spec: &Value) -> bool {
    let Some(actual) = lookup_field(doc, field) else {
        return false;
    };
    let (expected, case_insensitive) = match spec {
        Value::Object(o) => (
            o.get("value").cloned().unwrap_or(Value::Null),
            o.get("case_insensitive").and_then(Value::as_bool).unwrap_or(false),
        ),
        other => (other.clone(), false),
    };
    if case_insensitive {
        value_as_text(actual).eq_ignore_ascii_case(&value_as_text(&expected))
    } else {
        *actual == expected
    }
}

fn matches_match(doc: &Value, field: &str, spec: &Value) -> bool {
    let Some(actual) = lookup_field(doc, field) else {
        return false;
    };
    let query = match spec {
        Value::Object(o) => o.get("query").map(value_as_text).unwrap_or_default(),
        other => value_as_text(other),
    };
    let haystack = value_as_text(actual).to_lowercase();
    // operator "and": every analyzed term must be present. The adapter
    // never emits "or", so that is the only mode implemented.
    query
        .to_lowercase()
        .split_whitespace()
        .all(|term| haystack.contains(term))
}

/// Evaluate a query clause against a document. Returns `Some(score)`
/// when the document matches; non-knn clauses score 1.0.
fn evaluate(doc: &Value, query: &Value) -> Option<f64> {
    let obj = query.as_object()?;
    if obj.contains_key("match_all") {
        return Some(1.0);
    }
    if let Some(term) = obj.get("term").and_then(Value::as_object) {
        let (field, spec) = term.iter().next()?;
        return matches_term(doc, field, spec).then_some(1.0);
    }
    if let Some(m) = obj.get("match").and_then(Value::as_object) {
        let (field, spec) = m.iter().next()?;
        return matches_match(doc, field, spec).then_some(1.0);
    }
    if let Some(knn) = obj.get("knn").and_then(Value::as_object) {
        let (field, spec) = knn.iter().next()?;
        return evaluate_knn(doc, field, spec);
    }
    if let Some(bool_query) = obj.get("bool").and_then(Value::as_object) {
        return evaluate_bool(doc, bool_query);
    }
    None
}

fn evaluate_knn(doc: &Value, field: &str, spec: &Value) -> Option<f64> {
    let vector: Vec<f32> = spec
        .get("vector")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_f64())
        .map(|v| v as f32)
        .collect();
    if let Some(filter) = spec.get("filter") {
        evaluate(doc, filter)?;
    }
    let stored: Vec<f32> = lookup_field(doc, field)?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_f64())
        .map(|v| v as f32)
        .collect();
    Some(cosine_similarity(&vector, &stored) as f64)
}

fn evaluate_bool(doc: &Value, bool_query: &Map<String, Value>) -> Option<f64> {
    let clauses = |key: &str| -> Vec<Value> {
        match bool_query.get(key) {
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
            None => Vec::new(),
        }
    };

    let mut score = 0.0;
    let must = clauses("must");
    let filter = clauses("filter");
    for clause in must.iter().chain(filter.iter()) {
        score += evaluate(doc, clause)?;
    }

    let should = clauses("should");
    if !should.is_empty() {
        let minimum = bool_query
            .get("minimum_should_match")
            .and_then(Value::as_u64)
            .unwrap_or(if must.is_empty() && filter.is_empty() { 1 } else { 0 });
        let mut matched = 0;
        for clause in &should {
            if let Some(s) = evaluate(doc, clause) {
                matched += 1;
                score += s;
            }
        }
        if (matched as u64) < minimum {
            return None;
        }
    }

    Some(if score == 0.0 { 1.0 } else { score })
}

/// Sort field fallback: `occurred_at` for activity documents, legacy
/// `timestamp` for chunk documents.
fn sort_key(doc: &Value) -> String {
    lookup_field(doc, "occurred_at")
        .or_else(|| lookup_field(doc, "timestamp"))
        .map(value_as_text)
        .unwrap_or_default()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        Ok(self.state.read().indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, _body: Value) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.indices.contains_key(index) {
            return Err(StoreError::AlreadyExists(index.to_string()));
        }
        state.indices.insert(index.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.indices.remove(index).is_none() {
            return Err(StoreError::NotFound(index.to_string()));
        }
        Ok(())
    }

    async fn get_index_template(&self, name: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.state.read().templates.get(name).cloned())
    }

    async fn put_index_template(&self, name: &str, body: Value) -> Result<(), StoreError> {
        self.state.write().templates.insert(name.to_string(), body);
        Ok(())
    }

    async fn bulk(&self, ops: Vec<BulkOp>) -> Result<BulkResponse, StoreError> {
        let mut state = self.state.write();
        let mut items = Vec::with_capacity(ops.len());
        for op in ops {
            state
                .indices
                .entry(op.index)
                .or_default()
                .insert(op.id.clone(), op.document);
            items.push(BulkItemResult {
                id: op.id,
                error: None,
            });
        }
        Ok(BulkResponse {
            errors: false,
            items,
        })
    }

    async fn search(&self, indices: &[String], body: Value) -> Result<Value, StoreError> {
        let state = self.state.read();

        let query = body.get("query").cloned().unwrap_or(json!({"match_all": {}}));
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let has_sort = body.get("sort").is_some();

        let mut hits: Vec<(String, f64, Value)> = Vec::new();
        for (name, docs) in &state.indices {
            if !indices.iter().any(|pattern| pattern_matches(pattern, name)) {
                continue;
            }
            for (id, doc) in docs {
                if let Some(score) = evaluate(doc, &query) {
                    hits.push((id.clone(), score, doc.clone()));
                }
            }
        }

        if has_sort {
            hits.sort_by(|a, b| sort_key(&a.2).cmp(&sort_key(&b.2)));
        } else {
            hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        }

        let total = hits.len();
        hits.truncate(size);
        let hit_values: Vec<Value> = hits
            .into_iter()
            .map(|(id, score, source)| {
                json!({"_id": id, "_score": score, "_source": source})
            })
            .collect();

        Ok(json!({
            "hits": {
                "total": {"value": total, "relation": "eq"},
                "hits": hit_values,
            }
        }))
    }
}
