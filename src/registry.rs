//! Tenant field-type registry: entry validation and a TTL-bounded cache.
//!
//! Each tenant may declare that a given metadata key carries a specific
//! scalar type and a matching typed-storage namespace (its "promotion
//! target"). The indexer consults this registry to route values into
//! typed sub-namespaces at write time; unregistered keys are never
//! promoted, which keeps the store's mapping bounded no matter how many
//! free-form keys producers invent.
//!
//! Fetching the registry from the external lookup on every indexed
//! document would be a lookup per event, so [`RegistryCache`] keeps one
//! entry per tenant with a 5-minute TTL, evicting expired entries on
//! every read and the globally oldest entries when the cache outgrows
//! its bound. The clock is injected so tests control expiry
//! deterministically.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RegistryCacheConfig;
use crate::error::{SearchError, SearchResult};

/// Declared scalar type of a metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataType {
    Number,
    Date,
    Boolean,
    Keyword,
    Text,
}

/// Typed sub-namespace a registered value is promoted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromoteTo {
    #[serde(rename = "meta_num")]
    MetaNum,
    #[serde(rename = "meta_date")]
    MetaDate,
    #[serde(rename = "meta_bool")]
    MetaBool,
    #[serde(rename = "meta_kw")]
    MetaKw,
    #[serde(rename = "meta_text")]
    MetaText,
}

impl PromoteTo {
    /// Field prefix used when writing promoted values.
    pub fn as_field(&self) -> &'static str {
        match self {
            PromoteTo::MetaNum => "meta_num",
            PromoteTo::MetaDate => "meta_date",
            PromoteTo::MetaBool => "meta_bool",
            PromoteTo::MetaKw => "meta_kw",
            PromoteTo::MetaText => "meta_text",
        }
    }
}

impl MetadataType {
    /// The promotion target that structurally corresponds to this type.
    pub fn expected_promote_to(&self) -> PromoteTo {
        match self {
            MetadataType::Number => PromoteTo::MetaNum,
            MetadataType::Date => PromoteTo::MetaDate,
            MetadataType::Boolean => PromoteTo::MetaBool,
            MetadataType::Keyword => PromoteTo::MetaKw,
            MetadataType::Text => PromoteTo::MetaText,
        }
    }
}

/// A per-tenant declaration that one metadata key has a specific type
/// and promotion target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub tenant_id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub metadata_type: MetadataType,
    pub promote_to: PromoteTo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl RegistryEntry {
    /// Validate type/promotion consistency. A mismatch is a validation
    /// error, not a silent coercion.
    pub fn validate(&self) -> SearchResult<()> {
        if self.key.is_empty() {
            return Err(SearchError::InvalidRegistryEntry(
                "key must be a non-empty string".to_string(),
            ));
        }
        let expected = self.metadata_type.expected_promote_to();
        if self.promote_to != expected {
            return Err(SearchError::InvalidRegistryEntry(format!(
                "key '{}': promote_to must match type (number->meta_num, date->meta_date, \
                 boolean->meta_bool, keyword->meta_kw, text->meta_text), got {:?} for {:?}",
                self.key, self.promote_to, self.metadata_type
            )));
        }
        Ok(())
    }
}

/// One tenant's full registry, keyed by metadata key.
pub type TenantRegistry = HashMap<String, RegistryEntry>;

/// External registry lookup capability, injected by the caller.
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    async fn get_registry_for_tenant(&self, tenant_id: &str) -> anyhow::Result<TenantRegistry>;
}

/// Injected time source so TTL expiry is deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry {
    registry: Arc<TenantRegistry>,
    fetched_at: DateTime<Utc>,
}

/// Per-tenant registry cache with strict TTL expiry and oldest-first
/// eviction on overflow.
pub struct RegistryCache {
    lookup: Option<Arc<dyn RegistryLookup>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl RegistryCache {
    pub fn new(lookup: Option<Arc<dyn RegistryLookup>>, config: &RegistryCacheConfig) -> Self {
        Self::with_clock(lookup, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        lookup: Option<Arc<dyn RegistryLookup>>,
        config: &RegistryCacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lookup,
            clock,
            ttl: Duration::seconds(config.ttl_secs as i64),
            max_entries: config.max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the registry for a tenant, serving from cache when fresh.
    ///
    /// Returns `None` when no lookup capability is configured, which
    /// signals that untyped indexing should be used. The external fetch
    /// runs without holding the cache lock, so a miss for one tenant
    /// never blocks reads for another.
    pub async fn get_registry_for_tenant(
        &self,
        tenant_id: &str,
    ) -> SearchResult<Option<Arc<TenantRegistry>>> {
        let Some(lookup) = &self.lookup else {
            return Ok(None);
        };

        self.evict();

        let now = self.clock.now();
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(tenant_id) {
                if now - entry.fetched_at <= self.ttl {
                    return Ok(Some(Arc::clone(&entry.registry)));
                }
            }
        }

        let registry = lookup
            .get_registry_for_tenant(tenant_id)
            .await
            .map_err(SearchError::Registry)?;
        let registry = Arc::new(registry);

        {
            let mut entries = self.entries.write();
            entries.insert(
                tenant_id.to_string(),
                CacheEntry {
                    registry: Arc::clone(&registry),
                    fetched_at: self.clock.now(),
                },
            );
        }
        self.evict();

        Ok(Some(registry))
    }

    /// Drop the cached entry for one tenant.
    pub fn invalidate(&self, tenant_id: &str) {
        self.entries.write().remove(tenant_id);
    }

    /// Drop all cached entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of currently cached tenants.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// TTL expiry is strict; after that, oldest-by-fetch-time entries go
    /// until the cache is within its size bound.
    fn evict(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        entries.retain(|_, entry| now - entry.fetched_at <= self.ttl);

        if entries.len() > self.max_entries {
            let mut by_age: Vec<(String, DateTime<Utc>)> = entries
                .iter()
                .map(|(tenant, entry)| (tenant.clone(), entry.fetched_at))
                .collect();
            by_age.sort_by_key(|(_, fetched_at)| *fetched_at);
            let excess = entries.len() - self.max_entries;
            for (tenant, _) in by_age.into_iter().take(excess) {
                entries.remove(&tenant);
                tracing::debug!(tenant = %tenant, "evicted registry cache entry (overflow)");
            }
        }
    }
}
