//! Document-store abstraction.
//!
//! The [`DocumentStore`] trait defines the operations the indexing and
//! search layers need from an external document store (an
//! OpenSearch/Elasticsearch-style cluster, or the in-memory
//! [`MemoryStore`](crate::memory::MemoryStore) for tests and embedded
//! use). Query and mapping bodies travel as `serde_json::Value` in the
//! store's native DSL; the adapter owns their shape.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

use async_trait::async_trait;
use serde_json::Value;

/// Errors surfaced by a [`DocumentStore`] implementation.
///
/// `AlreadyExists` and `NotFound` are distinguished from generic request
/// failures so callers can implement idempotent setup (concurrent
/// create-index races treat `AlreadyExists` as success) without matching
/// on error message strings.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The index or template being created already exists.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The index or template does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The store rejected the request as malformed; carries the store's
    /// reason text (e.g. a mapping conflict).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport or store-side failure.
    #[error("store request failed: {0}")]
    Request(#[from] anyhow::Error),
}

/// A single bulk index operation: write `document` under `id` into
/// `index`, overwriting any existing document with that id.
#[derive(Debug, Clone)]
pub struct BulkOp {
    pub index: String,
    pub id: String,
    pub document: Value,
}

/// Per-item outcome of a bulk write.
#[derive(Debug, Clone)]
pub struct BulkItemResult {
    pub id: String,
    /// Store-provided error detail; `None` means the item succeeded.
    pub error: Option<String>,
}

/// Result of a bulk write. Bulk semantics are per-item, not
/// transactional: some items may have succeeded even when `errors` is
/// set.
#[derive(Debug, Clone)]
pub struct BulkResponse {
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    /// The failing items, in store order.
    pub fn failures(&self) -> Vec<&BulkItemResult> {
        self.items.iter().filter(|i| i.error.is_some()).collect()
    }
}

/// Abstract document store consumed by the search adapter.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether the named index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError>;

    /// Create an index with the given settings/mappings body.
    async fn create_index(&self, index: &str, body: Value) -> Result<(), StoreError>;

    /// Delete an index and all its documents.
    async fn delete_index(&self, index: &str) -> Result<(), StoreError>;

    /// Fetch an index template body, or `None` if it is not defined.
    async fn get_index_template(&self, name: &str) -> Result<Option<Value>, StoreError>;

    /// Create or replace an index template.
    async fn put_index_template(&self, name: &str, body: Value) -> Result<(), StoreError>;

    /// Execute a bulk write. Missing target indices are created
    /// implicitly (template mappings apply when the name matches a
    /// template pattern).
    async fn bulk(&self, ops: Vec<BulkOp>) -> Result<BulkResponse, StoreError>;

    /// Run a search over one or more indices (patterns allowed) and
    /// return the store's raw response body. Indices matching nothing
    /// contribute zero hits rather than an error.
    async fn search(&self, indices: &[String], body: Value) -> Result<Value, StoreError>;
}
