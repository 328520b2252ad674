//! Document indexer and search executor.
//!
//! [`SearchAdapter`] ties the injected capabilities together: it builds
//! index bodies and templates for the configured embedding dimension,
//! writes activity events into daily partitions with registry-driven
//! metadata promotion, and runs the two search modes (vector kNN and
//! exact identifier lookup) against the document store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{BulkItemFailure, SearchError, SearchResult};
use crate::fields::resolve_paths;
use crate::models::{
    ActivityEventDocument, DocChunk, ExactSearchArgs, ExactSearchHit, KnnSearchArgs, KnnSearchHit,
};
use crate::registry::{RegistryCache, RegistryLookup, TenantRegistry};
use crate::store::{BulkOp, DocumentStore, StoreError};

pub struct SearchAdapter {
    store: Arc<dyn DocumentStore>,
    embedding: Arc<dyn EmbeddingProvider>,
    config: Config,
    registry_cache: RegistryCache,
}

impl SearchAdapter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedding: Arc<dyn EmbeddingProvider>,
        config: Config,
        registry_lookup: Option<Arc<dyn RegistryLookup>>,
    ) -> Self {
        let registry_cache = RegistryCache::new(registry_lookup, &config.registry_cache);
        Self {
            store,
            embedding,
            config,
            registry_cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry_cache(&self) -> &RegistryCache {
        &self.registry_cache
    }

    /// Create the chunk index with knn settings if it does not exist.
    /// A concurrent create racing this one is treated as success.
    pub async fn ensure_index(&self) -> SearchResult<()> {
        let index = &self.config.index.name;
        if self.store.index_exists(index).await? {
            return Ok(());
        }
        let body = json!({
            "settings": {"index": {"knn": true}},
            "mappings": {
                "properties": {
                    "id": {"type": "keyword"},
                    "timestamp": {"type": "date"},
                    "level": {"type": "keyword"},
                    "service": {"type": "keyword"},
                    "message": {"type": "text"},
                    "metadata": {"type": "object", "enabled": true},
                    "embedding": {
                        "type": "knn_vector",
                        "dimension": self.embedding.dims(),
                    },
                }
            }
        });
        match self.store.create_index(index, body).await {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Create or refresh the activity index template.
    ///
    /// If a template already exists with a different embedding
    /// dimension, fails with [`SearchError::DimensionMismatch`] rather
    /// than silently rewriting mappings the stored vectors no longer
    /// fit.
    pub async fn ensure_index_template(&self) -> SearchResult<()> {
        let name = &self.config.index.template_name;
        let expected = self.embedding.dims();

        if let Some(existing) = self.store.get_index_template(name).await? {
            if let Some(actual) = template_dimension(&existing) {
                if actual != expected {
                    return Err(SearchError::DimensionMismatch { expected, actual });
                }
            }
        }

        let body = self.activity_template_body();
        match self.store.put_index_template(name, body).await {
            Ok(()) => Ok(()),
            // A put rejected over the embedding mapping usually means a
            // concurrent writer installed a conflicting template between
            // our check and the put. Re-read and report the real
            // mismatch when that is what happened.
            Err(StoreError::InvalidRequest(reason)) if reason.contains("dimension") => {
                if let Some(existing) = self.store.get_index_template(name).await? {
                    if let Some(actual) = template_dimension(&existing) {
                        if actual != expected {
                            return Err(SearchError::DimensionMismatch { expected, actual });
                        }
                    }
                }
                Err(StoreError::InvalidRequest(reason).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn activity_template_body(&self) -> Value {
        json!({
            "index_patterns": [self.config.index.partition_pattern()],
            "template": {
                "settings": {"index": {"knn": true}},
                "mappings": {
                    "properties": {
                        "event_id": {"type": "keyword"},
                        "tenant_id": {"type": "keyword"},
                        "occurred_at": {"type": "date"},
                        "category": {"type": "keyword"},
                        "action": {"type": "keyword"},
                        "outcome": {"type": "keyword"},
                        "source": {"type": "keyword"},
                        "schema_version": {"type": "keyword"},
                        "title": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
                        "summary": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
                        "message": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
                        "actor": {
                            "properties": {
                                "user_id": {"type": "keyword"},
                                "email_hash": {"type": "keyword"},
                                "service_name": {"type": "keyword"},
                                "role": {"type": "keyword"},
                            }
                        },
                        "object": {
                            "properties": {
                                "order_id": {"type": "keyword"},
                                "request_id": {"type": "keyword"},
                                "session_id": {"type": "keyword"},
                                "ticket_id": {"type": "keyword"},
                                "resource_id": {"type": "keyword"},
                            }
                        },
                        "correlation": {
                            "properties": {
                                "trace_id": {"type": "keyword"},
                                "span_id": {"type": "keyword"},
                                "correlation_id": {"type": "keyword"},
                                "parent_event_id": {"type": "keyword"},
                            }
                        },
                        "meta_json": {"type": "text", "index": false},
                        "meta_kv": {"type": "keyword"},
                        "meta_num": {"type": "object"},
                        "meta_date": {"type": "object"},
                        "meta_bool": {"type": "object"},
                        "meta_kw": {"type": "object"},
                        "meta_text": {"type": "object"},
                        "embedding": {
                            "type": "knn_vector",
                            "dimension": self.embedding.dims(),
                        },
                    }
                }
            }
        })
    }

    /// Delete the chunk index; absent index is already clear.
    pub async fn clear_index(&self) -> SearchResult<()> {
        match self.store.delete_index(&self.config.index.name).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Index activity events into daily partitions
    /// (`{prefix}-YYYY.MM.DD` by `occurred_at` UTC date), one bulk write
    /// per partition, fired concurrently. Partial failures from all
    /// partitions are surfaced together.
    pub async fn index_activity_events(
        &self,
        events: Vec<ActivityEventDocument>,
    ) -> SearchResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut partitions: Vec<(String, Vec<ActivityEventDocument>)> = Vec::new();
        for event in events {
            let partition = self.partition_for(&event.occurred_at);
            match partitions.iter_mut().find(|(name, _)| *name == partition) {
                Some((_, batch)) => batch.push(event),
                None => partitions.push((partition, vec![event])),
            }
        }

        let writes = partitions
            .into_iter()
            .map(|(index, batch)| self.bulk_activity_write(index, batch));
        let results = join_all(writes).await;

        let mut failures = Vec::new();
        for result in results {
            failures.extend(result?);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SearchError::bulk_failure(failures))
        }
    }

    /// Index activity events into one explicit target index.
    pub async fn index_activity_events_into(
        &self,
        events: Vec<ActivityEventDocument>,
        index: &str,
    ) -> SearchResult<()> {
        let failures = self.bulk_activity_write(index.to_string(), events).await?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SearchError::bulk_failure(failures))
        }
    }

    async fn bulk_activity_write(
        &self,
        index: String,
        events: Vec<ActivityEventDocument>,
    ) -> SearchResult<Vec<BulkItemFailure>> {
        let mut ops = Vec::with_capacity(events.len());
        for event in events {
            let registry = self
                .registry_cache
                .get_registry_for_tenant(&event.tenant_id)
                .await?;
            let document = build_activity_document(&event, registry.as_deref());
            ops.push(BulkOp {
                index: index.clone(),
                id: event.event_id,
                document,
            });
        }
        let response = self.store.bulk(ops).await?;
        Ok(response
            .failures()
            .into_iter()
            .map(|item| BulkItemFailure {
                id: item.id.clone(),
                reason: item.error.clone().unwrap_or_default(),
            })
            .collect())
    }

    fn partition_for(&self, occurred_at: &str) -> String {
        let date = match DateTime::parse_from_rfc3339(occurred_at) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(_) => {
                tracing::warn!(
                    occurred_at = %occurred_at,
                    "unparseable occurred_at, partitioning by current date"
                );
                Utc::now()
            }
        };
        format!(
            "{}-{}",
            self.config.index.partition_prefix,
            date.format("%Y.%m.%d")
        )
    }

    /// Embed chunk messages in one batch and index them into the
    /// configured chunk index.
    pub async fn index_chunks(&self, chunks: Vec<DocChunk>) -> SearchResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.ensure_index().await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.message.clone()).collect();
        let vectors = self
            .embedding
            .embed_many(&texts)
            .await
            .map_err(SearchError::Embedding)?;

        let ops = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| BulkOp {
                index: self.config.index.name.clone(),
                id: chunk.id.clone(),
                document: json!({
                    "id": chunk.id,
                    "timestamp": chunk.timestamp,
                    "level": chunk.level,
                    "service": chunk.service,
                    "message": chunk.message,
                    "metadata": chunk.metadata,
                    "embedding": embedding,
                }),
            })
            .collect();

        let response = self.store.bulk(ops).await?;
        let failures: Vec<BulkItemFailure> = response
            .failures()
            .into_iter()
            .map(|item| BulkItemFailure {
                id: item.id.clone(),
                reason: item.error.clone().unwrap_or_default(),
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SearchError::bulk_failure(failures))
        }
    }

    /// Vector similarity search over the chunk index.
    ///
    /// With filters present, 3x the requested k is fetched before the
    /// filter narrows the candidates, then the top k are returned.
    pub async fn knn_search(&self, args: KnnSearchArgs) -> SearchResult<Vec<KnnSearchHit>> {
        let search = &self.config.search;
        let k = args
            .k
            .unwrap_or(search.knn_default_k)
            .clamp(1, search.knn_max_k);

        let vector = self
            .embedding
            .embed(&args.query)
            .await
            .map_err(SearchError::Embedding)?;

        let has_filter = args.filter.as_ref().is_some_and(|f| !f.is_empty());
        let fetch = if has_filter {
            k * search.knn_filter_overfetch
        } else {
            k
        };

        let mut knn_clause = json!({
            "vector": vector,
            "k": fetch,
        });
        if has_filter {
            if let Some(filter) = &args.filter {
                knn_clause["filter"] = json!({
                    "bool": {"filter": filter_clauses(filter)}
                });
            }
        }

        let body = json!({
            "size": fetch,
            "query": {"knn": {"embedding": knn_clause}},
        });

        let response = self
            .store
            .search(&[self.config.index.name.clone()], body)
            .await?;

        let mut hits: Vec<KnnSearchHit> = raw_hits(&response)
            .iter()
            .map(|hit| KnnSearchHit {
                id: str_field(hit, "_id").unwrap_or_default(),
                score: hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
                text: hit
                    .pointer("/_source/message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                metadata: hit.get("_source").cloned().unwrap_or(Value::Null),
            })
            .collect();
        hits.truncate(k);
        Ok(hits)
    }

    /// Exact identifier search across the activity partitions and the
    /// chunk index, ascending by timestamp.
    ///
    /// At most `exact_search_max_hits` (default 1000) hits are returned;
    /// anything beyond that is silently dropped. The result compressor
    /// downstream bounds the output anyway.
    pub async fn exact_search(&self, args: ExactSearchArgs) -> SearchResult<Vec<ExactSearchHit>> {
        let paths = resolve_paths(&self.config.field_mapping, &args.identifier_type);
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let mut should = Vec::with_capacity(paths.len() * 2);
        for path in &paths {
            should.push(json!({
                "term": {path: {"value": args.identifier, "case_insensitive": true}}
            }));
            should.push(json!({
                "match": {path: {"query": args.identifier, "operator": "and"}}
            }));
        }

        let body = json!({
            "size": self.config.search.exact_search_max_hits,
            "query": {"bool": {"should": should, "minimum_should_match": 1}},
            "sort": [{
                "_script": {
                    "type": "string",
                    "order": "asc",
                    "script": {
                        "lang": "painless",
                        "source": "doc.containsKey('occurred_at') && doc['occurred_at'].size() > 0 \
                                   ? doc['occurred_at'].value.toString() \
                                   : (doc.containsKey('timestamp') && doc['timestamp'].size() > 0 \
                                      ? doc['timestamp'].value.toString() : '')",
                    }
                }
            }],
        });

        let indices = vec![
            self.config.index.partition_pattern(),
            self.config.index.name.clone(),
        ];
        let response = self.store.search(&indices, body).await?;

        Ok(raw_hits(&response)
            .iter()
            .map(|hit| project_exact_hit(hit))
            .collect())
    }
}

/// Embedding dimension declared by a template body, looking through the
/// composable-template wrapper when present.
fn template_dimension(template: &Value) -> Option<usize> {
    let mappings = template
        .pointer("/template/mappings")
        .or_else(|| template.get("mappings"))?;
    mappings
        .pointer("/properties/embedding/dimension")
        .and_then(Value::as_u64)
        .map(|d| d as usize)
}

/// One ANDed clause per filter key, each matching the value against the
/// bare field or its `metadata.`-nested variant, exact or fuzzy.
fn filter_clauses(filter: &Map<String, Value>) -> Vec<Value> {
    filter
        .iter()
        .map(|(field, value)| {
            let nested = format!("metadata.{}", field);
            json!({
                "bool": {
                    "should": [
                        {"term": {&*field: {"value": value, "case_insensitive": true}}},
                        {"term": {&*nested: {"value": value, "case_insensitive": true}}},
                        {"match": {&*field: {"query": value, "operator": "and"}}},
                        {"match": {&*nested: {"query": value, "operator": "and"}}},
                    ],
                    "minimum_should_match": 1,
                }
            })
        })
        .collect()
}

fn raw_hits(response: &Value) -> Vec<Value> {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn source_str(hit: &Value, key: &str) -> Option<String> {
    hit.pointer(&format!("/_source/{}", key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Projection with fallbacks across the two document generations:
/// activity documents carry `occurred_at`/`outcome`/`source`, chunk
/// documents carry `timestamp`/`level`/`service`.
fn project_exact_hit(hit: &Value) -> ExactSearchHit {
    ExactSearchHit {
        id: source_str(hit, "event_id")
            .or_else(|| str_field(hit, "_id"))
            .unwrap_or_default(),
        timestamp: source_str(hit, "occurred_at")
            .or_else(|| source_str(hit, "timestamp"))
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string()),
        level: source_str(hit, "level")
            .or_else(|| source_str(hit, "outcome"))
            .unwrap_or_else(|| "unknown".to_string()),
        service: source_str(hit, "source")
            .or_else(|| source_str(hit, "service"))
            .unwrap_or_else(|| "unknown".to_string()),
        message: source_str(hit, "message")
            .or_else(|| source_str(hit, "summary"))
            .or_else(|| source_str(hit, "title"))
            .unwrap_or_default(),
        metadata: hit.get("_source").cloned().unwrap_or(Value::Null),
    }
}

/// Build the indexable document for one activity event.
///
/// Metadata is always preserved losslessly as a `meta_json` blob plus
/// flat `meta_kv` `key=value` strings for scalar values. Keys the
/// tenant has registered are additionally promoted into their typed
/// namespace as flat `{promote_to}.{key}` fields; a value that fails
/// its declared conversion is skipped with a warning and the document
/// still indexes.
pub fn build_activity_document(
    event: &ActivityEventDocument,
    registry: Option<&TenantRegistry>,
) -> Value {
    let mut doc = match serde_json::to_value(event) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    doc.remove("metadata");

    let metadata = &event.metadata;
    if !metadata.is_empty() {
        doc.insert(
            "meta_json".to_string(),
            Value::String(serde_json::to_string(metadata).unwrap_or_default()),
        );
        let kv: Vec<Value> = metadata
            .iter()
            .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
            .map(|(k, v)| Value::String(format!("{}={}", k, scalar_text(v))))
            .collect();
        if !kv.is_empty() {
            doc.insert("meta_kv".to_string(), Value::Array(kv));
        }
    }

    if let Some(registry) = registry {
        for (key, value) in metadata {
            let Some(entry) = registry.get(key) else {
                continue;
            };
            if let Err(e) = entry.validate() {
                tracing::warn!(key = %key, error = %e, "skipping invalid registry entry");
                continue;
            }
            match convert_registered(value, entry.metadata_type) {
                Some(converted) => {
                    doc.insert(format!("{}.{}", entry.promote_to.as_field(), key), converted);
                }
                None => {
                    tracing::warn!(
                        key = %key,
                        declared_type = ?entry.metadata_type,
                        "metadata value failed declared-type conversion, not promoted"
                    );
                }
            }
        }
    }

    Value::Object(doc)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a raw metadata value to its registered type. `None` means
/// the value does not fit the declared type.
fn convert_registered(value: &Value, declared: crate::registry::MetadataType) -> Option<Value> {
    use crate::registry::MetadataType;
    match declared {
        MetadataType::Number => {
            let n = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            if n.is_finite() {
                serde_json::Number::from_f64(n).map(Value::Number)
            } else {
                None
            }
        }
        MetadataType::Date => {
            match value {
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|d| Value::String(d.with_timezone(&Utc).to_rfc3339())),
                // Numbers are epoch milliseconds.
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .map(|d| Value::String(d.to_rfc3339())),
                _ => None,
            }
        }
        MetadataType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        MetadataType::Keyword | MetadataType::Text => Some(Value::String(scalar_text(value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StaticProvider;
    use crate::memory::MemoryStore;
    use crate::models::ACTIVITY_EVENT_SCHEMA_VERSION;
    use crate::registry::{MetadataType, PromoteTo, RegistryEntry};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const DIMS: usize = 8;

    fn test_adapter(lookup: Option<Arc<dyn RegistryLookup>>) -> (SearchAdapter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let embedding = Arc::new(StaticProvider::new(DIMS));
        let adapter = SearchAdapter::new(store.clone(), embedding, Config::default(), lookup);
        (adapter, store)
    }

    fn entry(key: &str, metadata_type: MetadataType, promote_to: PromoteTo) -> RegistryEntry {
        RegistryEntry {
            tenant_id: "t1".into(),
            key: key.into(),
            metadata_type,
            promote_to,
            constraints: None,
            created_at: Utc::now(),
        }
    }

    fn event(id: &str, occurred_at: &str, metadata: Map<String, Value>) -> ActivityEventDocument {
        ActivityEventDocument {
            event_id: id.into(),
            tenant_id: "t1".into(),
            occurred_at: occurred_at.into(),
            category: "order".into(),
            action: "created".into(),
            outcome: "success".into(),
            source: "checkout".into(),
            schema_version: ACTIVITY_EVENT_SCHEMA_VERSION.into(),
            title: None,
            summary: None,
            message: Some(format!("event {}", id)),
            actor: None,
            object: None,
            correlation: None,
            metadata,
            embedding: vec![0.5; DIMS],
        }
    }

    struct FixedLookup(TenantRegistry);

    #[async_trait]
    impl RegistryLookup for FixedLookup {
        async fn get_registry_for_tenant(&self, _tenant_id: &str) -> anyhow::Result<TenantRegistry> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let (adapter, store) = test_adapter(None);
        adapter.ensure_index().await.unwrap();
        adapter.ensure_index().await.unwrap();
        assert_eq!(store.index_names(), vec!["activity-chunks".to_string()]);
    }

    #[tokio::test]
    async fn test_template_dimension_mismatch_is_fatal() {
        let (adapter, store) = test_adapter(None);
        store
            .put_index_template(
                "activity-template",
                json!({"template": {"mappings": {"properties": {
                    "embedding": {"type": "knn_vector", "dimension": 4096}
                }}}}),
            )
            .await
            .unwrap();
        let err = adapter.ensure_index_template().await.unwrap_err();
        match err {
            SearchError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, DIMS);
                assert_eq!(actual, 4096);
            }
            other => panic!("expected DimensionMismatch, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_template_matching_dimension_is_refreshed() {
        let (adapter, store) = test_adapter(None);
        adapter.ensure_index_template().await.unwrap();
        adapter.ensure_index_template().await.unwrap();
        let template = store
            .get_index_template("activity-template")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(template_dimension(&template), Some(DIMS));
    }

    #[test]
    fn test_build_document_promotes_registered_keys() {
        let mut registry = HashMap::new();
        registry.insert(
            "amount".to_string(),
            entry("amount", MetadataType::Number, PromoteTo::MetaNum),
        );
        registry.insert(
            "expedited".to_string(),
            entry("expedited", MetadataType::Boolean, PromoteTo::MetaBool),
        );
        registry.insert(
            "order_ref".to_string(),
            entry("order_ref", MetadataType::Keyword, PromoteTo::MetaKw),
        );

        let mut metadata = Map::new();
        metadata.insert("amount".into(), json!("42.5"));
        metadata.insert("expedited".into(), json!("yes"));
        metadata.insert("order_ref".into(), json!("ord_123"));
        metadata.insert("unregistered".into(), json!("kept-but-not-promoted"));

        let doc = build_activity_document(
            &event("e1", "2026-01-01T10:00:00Z", metadata),
            Some(&registry),
        );

        assert_eq!(doc["meta_num.amount"], json!(42.5));
        assert_eq!(doc["meta_bool.expedited"], json!(true));
        assert_eq!(doc["meta_kw.order_ref"], json!("ord_123"));
        assert!(doc.get("meta_kw.unregistered").is_none());
        // Lossless blob and kv projection are always present.
        assert!(doc["meta_json"].as_str().unwrap().contains("unregistered"));
        let kv: Vec<&str> = doc["meta_kv"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(kv.contains(&"amount=42.5"));
        assert!(kv.contains(&"unregistered=kept-but-not-promoted"));
    }

    #[test]
    fn test_build_document_skips_unconvertible_values() {
        let mut registry = HashMap::new();
        registry.insert(
            "amount".to_string(),
            entry("amount", MetadataType::Number, PromoteTo::MetaNum),
        );
        registry.insert(
            "when".to_string(),
            entry("when", MetadataType::Date, PromoteTo::MetaDate),
        );

        let mut metadata = Map::new();
        metadata.insert("amount".into(), json!("not a number"));
        metadata.insert("when".into(), json!("yesterday-ish"));

        let doc = build_activity_document(
            &event("e1", "2026-01-01T10:00:00Z", metadata),
            Some(&registry),
        );
        assert!(doc.get("meta_num.amount").is_none());
        assert!(doc.get("meta_date.when").is_none());
        // The document itself still carries the raw values.
        assert!(doc["meta_json"].as_str().unwrap().contains("not a number"));
    }

    #[test]
    fn test_date_conversion_accepts_epoch_millis() {
        let converted = convert_registered(&json!(1767225600000i64), MetadataType::Date).unwrap();
        assert!(converted.as_str().unwrap().starts_with("2026-01-01T"));
    }

    #[tokio::test]
    async fn test_events_partition_by_utc_date() {
        let (adapter, store) = test_adapter(None);
        adapter
            .index_activity_events(vec![
                event("e1", "2026-01-01T10:00:00Z", Map::new()),
                event("e2", "2026-01-01T23:59:59Z", Map::new()),
                event("e3", "2026-01-02T00:00:01Z", Map::new()),
            ])
            .await
            .unwrap();
        assert_eq!(store.doc_count("activity-2026.01.01"), 2);
        assert_eq!(store.doc_count("activity-2026.01.02"), 1);
    }

    #[tokio::test]
    async fn test_reindex_same_event_id_overwrites() {
        let (adapter, store) = test_adapter(None);
        let first = event("e1", "2026-01-01T10:00:00Z", Map::new());
        adapter.index_activity_events(vec![first.clone()]).await.unwrap();
        adapter.index_activity_events(vec![first]).await.unwrap();
        assert_eq!(store.doc_count("activity-2026.01.01"), 1);
    }

    #[tokio::test]
    async fn test_knn_search_returns_ranked_hits() {
        let (adapter, _store) = test_adapter(None);
        adapter
            .index_chunks(vec![
                DocChunk {
                    id: "c1".into(),
                    timestamp: "2026-01-01T00:00:00Z".into(),
                    level: "info".into(),
                    service: "checkout".into(),
                    message: "payment declined for order".into(),
                    metadata: Map::new(),
                },
                DocChunk {
                    id: "c2".into(),
                    timestamp: "2026-01-01T00:01:00Z".into(),
                    level: "info".into(),
                    service: "checkout".into(),
                    message: "payment declined for order".into(),
                    metadata: Map::new(),
                },
            ])
            .await
            .unwrap();

        let hits = adapter
            .knn_search(KnnSearchArgs {
                query: "payment declined for order".into(),
                k: Some(1),
                filter: None,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.99);
        assert_eq!(hits[0].text, "payment declined for order");
    }

    #[tokio::test]
    async fn test_knn_filter_narrows_candidates() {
        let (adapter, _store) = test_adapter(None);
        let chunk = |id: &str, service: &str| DocChunk {
            id: id.into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            level: "info".into(),
            service: service.into(),
            message: "shared message text".into(),
            metadata: Map::new(),
        };
        adapter
            .index_chunks(vec![chunk("c1", "checkout"), chunk("c2", "billing")])
            .await
            .unwrap();

        let mut filter = Map::new();
        filter.insert("service".into(), json!("billing"));
        let hits = adapter
            .knn_search(KnnSearchArgs {
                query: "shared message text".into(),
                k: Some(5),
                filter: Some(filter),
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c2");
    }

    #[tokio::test]
    async fn test_exact_search_spans_generations_sorted() {
        let (adapter, _store) = test_adapter(None);

        let mut metadata = Map::new();
        metadata.insert("order_id".into(), json!("ord_9"));
        adapter
            .index_activity_events(vec![event("e1", "2026-01-02T10:00:00Z", Map::new())])
            .await
            .unwrap();
        adapter
            .index_chunks(vec![DocChunk {
                id: "c1".into(),
                timestamp: "2026-01-01T00:00:00Z".into(),
                level: "error".into(),
                service: "billing".into(),
                message: "order e1 failed".into(),
                metadata,
            }])
            .await
            .unwrap();

        let hits = adapter
            .exact_search(ExactSearchArgs {
                identifier: "e1".into(),
                identifier_type: "eventId".into(),
            })
            .await
            .unwrap();
        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_exact_search_unknown_type_with_no_paths_is_empty() {
        let mut config = Config::default();
        config.field_mapping.conventions.snake_case = false;
        config.field_mapping.conventions.camel_case = false;
        config.field_mapping.conventions.kebab_case = false;
        config.field_mapping.conventions.pascal_case = false;
        let adapter = SearchAdapter::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticProvider::new(DIMS)),
            config,
            None,
        );
        let hits = adapter
            .exact_search(ExactSearchArgs {
                identifier: "x".into(),
                identifier_type: "mysteryId".into(),
            })
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_registry_promotion_end_to_end() {
        let mut registry = HashMap::new();
        registry.insert(
            "order_ref".to_string(),
            entry("order_ref", MetadataType::Keyword, PromoteTo::MetaKw),
        );
        let (adapter, store) = test_adapter(Some(Arc::new(FixedLookup(registry))));

        let mut metadata = Map::new();
        metadata.insert("order_ref".into(), json!("ORD_777"));
        adapter
            .index_activity_events(vec![event("e1", "2026-01-01T10:00:00Z", metadata)])
            .await
            .unwrap();

        // The promoted flat field is queryable case-insensitively.
        let body = json!({
            "size": 10,
            "query": {"term": {"meta_kw.order_ref": {"value": "ord_777", "case_insensitive": true}}},
        });
        let response = store
            .search(&["activity-*".to_string()], body)
            .await
            .unwrap();
        assert_eq!(response["hits"]["total"]["value"], 1);
    }

    /// Store whose bulk writes reject every item, as a mapping conflict
    /// would.
    struct RejectingStore;

    #[async_trait]
    impl crate::store::DocumentStore for RejectingStore {
        async fn index_exists(&self, _index: &str) -> Result<bool, StoreError> {
            Ok(true)
        }
        async fn create_index(&self, _index: &str, _body: Value) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_index(&self, _index: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_index_template(&self, _name: &str) -> Result<Option<Value>, StoreError> {
            Ok(None)
        }
        async fn put_index_template(&self, _name: &str, _body: Value) -> Result<(), StoreError> {
            Ok(())
        }
        async fn bulk(
            &self,
            ops: Vec<BulkOp>,
        ) -> Result<crate::store::BulkResponse, StoreError> {
            let items = ops
                .into_iter()
                .map(|op| crate::store::BulkItemResult {
                    id: op.id,
                    error: Some("mapper_parsing_exception".to_string()),
                })
                .collect();
            Ok(crate::store::BulkResponse { errors: true, items })
        }
        async fn search(&self, _indices: &[String], _body: Value) -> Result<Value, StoreError> {
            Ok(json!({"hits": {"total": {"value": 0}, "hits": []}}))
        }
    }

    #[tokio::test]
    async fn test_bulk_partial_failure_carries_item_detail() {
        let adapter = SearchAdapter::new(
            Arc::new(RejectingStore),
            Arc::new(StaticProvider::new(DIMS)),
            Config::default(),
            None,
        );
        let err = adapter
            .index_activity_events(vec![
                event("e1", "2026-01-01T10:00:00Z", Map::new()),
                event("e2", "2026-01-01T11:00:00Z", Map::new()),
            ])
            .await
            .unwrap_err();
        match err {
            SearchError::BulkFailure {
                failed,
                summary,
                failures,
            } => {
                assert_eq!(failed, 2);
                assert!(summary.contains("e1: mapper_parsing_exception"));
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[1].id, "e2");
                assert_eq!(failures[1].reason, "mapper_parsing_exception");
            }
            other => panic!("expected BulkFailure, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_index_into_explicit_target_skips_partitioning() {
        let (adapter, store) = test_adapter(None);
        adapter
            .index_activity_events_into(
                vec![
                    event("e1", "2026-01-01T10:00:00Z", Map::new()),
                    event("e2", "2026-06-30T10:00:00Z", Map::new()),
                ],
                "activity-backfill",
            )
            .await
            .unwrap();
        assert_eq!(store.doc_count("activity-backfill"), 2);
        assert_eq!(store.index_names(), vec!["activity-backfill".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_index_is_idempotent() {
        let (adapter, store) = test_adapter(None);
        adapter.ensure_index().await.unwrap();
        adapter.clear_index().await.unwrap();
        assert_eq!(store.doc_count("activity-chunks"), 0);
        assert!(!store.index_exists("activity-chunks").await.unwrap());
        // Absent index already satisfies the postcondition.
        adapter.clear_index().await.unwrap();
    }
}
