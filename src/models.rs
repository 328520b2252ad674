//! Core data models for activity event indexing and retrieval.
//!
//! These types mirror the activity event schema version `1.0.0`: an event
//! carries a stable id used as the document primary key (re-indexing the
//! same id overwrites, never duplicates), a set of required core fields,
//! optional structured sub-objects, an open-ended metadata mapping, and a
//! fixed-length embedding vector.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current activity event schema version.
pub const ACTIVITY_EVENT_SCHEMA_VERSION: &str = "1.0.0";

/// Who performed the action described by an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Business-object references attached to an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// Distributed-tracing correlation identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Correlation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
}

/// An activity event ready for indexing: normalized fields plus a
/// precomputed embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEventDocument {
    pub event_id: String,
    pub tenant_id: String,
    /// ISO-8601 occurrence timestamp.
    pub occurred_at: String,
    pub category: String,
    pub action: String,
    pub outcome: String,
    pub source: String,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Correlation>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub embedding: Vec<f32>,
}

/// A generic document chunk for the single-index ingestion path.
///
/// Unlike [`ActivityEventDocument`], chunks carry no embedding; the
/// indexer embeds their messages in one batch at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChunk {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub service: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A hit from vector similarity search, in descending relevance order.
#[derive(Debug, Clone, Serialize)]
pub struct KnnSearchHit {
    pub id: String,
    pub score: f64,
    /// The document's message text.
    pub text: String,
    /// Full source payload.
    pub metadata: Value,
}

/// A hit from exact identifier search, in ascending timestamp order.
///
/// Projection falls back across schema generations: `occurred_at` or
/// legacy `timestamp`, `level` or `outcome`, `source` or `service`.
#[derive(Debug, Clone, Serialize)]
pub struct ExactSearchHit {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub service: String,
    pub message: String,
    /// Full source payload.
    pub metadata: Value,
}

/// The compact event projection consumed by the result compressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryEvent {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub service: String,
    pub message: String,
}

impl From<&ExactSearchHit> for StoryEvent {
    fn from(hit: &ExactSearchHit) -> Self {
        Self {
            id: hit.id.clone(),
            timestamp: hit.timestamp.clone(),
            level: hit.level.clone(),
            service: hit.service.clone(),
            message: hit.message.clone(),
        }
    }
}

/// Arguments for vector similarity search.
#[derive(Debug, Clone, Default)]
pub struct KnnSearchArgs {
    pub query: String,
    /// Neighbor count; defaults to 8, capped at 20.
    pub k: Option<usize>,
    /// Structured filter: each key is matched against both the bare
    /// field and its `metadata.`-nested variant.
    pub filter: Option<Map<String, Value>>,
}

/// Arguments for exact identifier search.
#[derive(Debug, Clone)]
pub struct ExactSearchArgs {
    pub identifier: String,
    pub identifier_type: String,
}
