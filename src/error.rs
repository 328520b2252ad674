//! Error types for indexing and search operations.

use crate::store::StoreError;

/// Result type for adapter operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Detail for one failing item in a bulk write.
#[derive(Debug, Clone)]
pub struct BulkItemFailure {
    pub id: String,
    pub reason: String,
}

/// Errors raised by the search adapter.
///
/// Empty result sets are never errors: searches that match nothing
/// return `Ok` with an empty vector.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The configured embedding dimension does not match the dimension
    /// already declared by the index template. Fatal configuration
    /// mismatch; never reconciled silently.
    #[error(
        "index template dimension mismatch: expected {expected}, but template has {actual}; \
         the embedding provider and the index template must agree"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    /// A bulk write reported per-item failures. Carries a sample of the
    /// failing items; items that succeeded are not rolled back.
    #[error("bulk indexing had {failed} failed item(s); first failures: {summary}")]
    BulkFailure {
        failed: usize,
        summary: String,
        failures: Vec<BulkItemFailure>,
    },

    /// A field-type registry entry whose declared type and promotion
    /// target are inconsistent.
    #[error("invalid registry entry: {0}")]
    InvalidRegistryEntry(String),

    /// The embedding provider failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// The tenant registry lookup failed.
    #[error("registry lookup failed: {0}")]
    Registry(#[source] anyhow::Error),

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SearchError {
    /// Build a [`SearchError::BulkFailure`] from failing items, keeping
    /// the first few in the message for actionable detail.
    pub fn bulk_failure(failures: Vec<BulkItemFailure>) -> Self {
        let summary = failures
            .iter()
            .take(3)
            .map(|f| format!("{}: {}", f.id, f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        Self::BulkFailure {
            failed: failures.len(),
            summary,
            failures,
        }
    }
}
