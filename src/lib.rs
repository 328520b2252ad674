//! # Activity Search
//!
//! An adaptive search-and-compression layer over a log/event document
//! store.
//!
//! Activity events are indexed into daily partitions with per-tenant
//! metadata type promotion, searched either by vector similarity (kNN
//! over precomputed embeddings) or by exact identifier lookup across
//! every naming convention a field might use, and large result sets are
//! compressed into a bounded, information-preserving summary instead of
//! being truncated.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Activity     │──▶│ SearchAdapter │──▶│ DocumentStore │
//! │ events/chunks│   │ embed+promote │   │ daily indices │
//! └──────────────┘   └───────┬───────┘   └───────┬───────┘
//!                            │                   │
//!              ┌─────────────┤                   │
//!              ▼             ▼                   ▼
//!        ┌──────────┐  ┌───────────┐      ┌───────────┐
//!        │   kNN    │  │   exact   │─────▶│ compress  │
//!        │  search  │  │  search   │      │ (patterns)│
//!        └──────────┘  └───────────┘      └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with validated defaults |
//! | [`error`] | Error taxonomy for indexing and search |
//! | [`models`] | Activity event, chunk, and hit types |
//! | [`store`] | `DocumentStore` trait and bulk/store errors |
//! | [`memory`] | In-memory store for tests and embedded use |
//! | [`embedding`] | Embedding providers (OpenAI, deterministic static) |
//! | [`fields`] | Identifier-type to field-path resolution |
//! | [`registry`] | Tenant field-type registry with a TTL cache |
//! | [`adapter`] | Document indexer and search executor |
//! | [`compress`] | Pattern clustering and representative selection |
//! | [`query_token`] | Opaque query-string codec |

pub mod adapter;
pub mod compress;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fields;
pub mod memory;
pub mod models;
pub mod query_token;
pub mod registry;
pub mod store;

pub use adapter::SearchAdapter;
pub use config::Config;
pub use error::{SearchError, SearchResult};
