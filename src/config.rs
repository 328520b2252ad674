use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::fields::FieldMappingConfig;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub registry_cache: RegistryCacheConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub field_mapping: FieldMappingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Single index for chunk-style documents.
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Name of the activity index template.
    #[serde(default = "default_template_name")]
    pub template_name: String,
    /// Prefix for date-partitioned activity indices; a partition is
    /// `{prefix}-YYYY.MM.DD` and the template pattern is `{prefix}-*`.
    #[serde(default = "default_partition_prefix")]
    pub partition_prefix: String,
}

fn default_index_name() -> String {
    "activity-chunks".to_string()
}
fn default_template_name() -> String {
    "activity-template".to_string()
}
fn default_partition_prefix() -> String {
    "activity".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            template_name: default_template_name(),
            partition_prefix: default_partition_prefix(),
        }
    }
}

impl IndexConfig {
    /// The index pattern covered by the activity template.
    pub fn partition_pattern(&self) -> String {
        format!("{}-*", self.partition_prefix)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimensionality; must match the embedding provider's
    /// declared output dimension.
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_dims() -> usize {
    3072
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Default neighbor count for vector search.
    #[serde(default = "default_knn_k")]
    pub knn_default_k: usize,
    /// Upper bound on caller-supplied k.
    #[serde(default = "default_knn_max_k")]
    pub knn_max_k: usize,
    /// Candidate over-fetch multiplier applied when structured filters
    /// are present, so filtering does not starve the top k.
    #[serde(default = "default_overfetch")]
    pub knn_filter_overfetch: usize,
    /// Hard cap on exact-search hits. Result sets beyond this are
    /// silently truncated; pagination happens via the query-token path.
    #[serde(default = "default_exact_max_hits")]
    pub exact_search_max_hits: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            knn_default_k: default_knn_k(),
            knn_max_k: default_knn_max_k(),
            knn_filter_overfetch: default_overfetch(),
            exact_search_max_hits: default_exact_max_hits(),
        }
    }
}

fn default_knn_k() -> usize {
    8
}
fn default_knn_max_k() -> usize {
    20
}
fn default_overfetch() -> usize {
    3
}
fn default_exact_max_hits() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryCacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for RegistryCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_cache_max_entries() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompressionConfig {
    /// Output budget: maximum events returned in a compressed summary.
    #[serde(default = "default_max_events")]
    pub max_events_in_output: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_events_in_output: default_max_events(),
        }
    }
}

fn default_max_events() -> usize {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.search.knn_default_k == 0 || config.search.knn_max_k == 0 {
        anyhow::bail!("search.knn_default_k and search.knn_max_k must be >= 1");
    }
    if config.search.knn_default_k > config.search.knn_max_k {
        anyhow::bail!("search.knn_default_k must not exceed search.knn_max_k");
    }
    if config.search.knn_filter_overfetch == 0 {
        anyhow::bail!("search.knn_filter_overfetch must be >= 1");
    }
    if config.search.exact_search_max_hits == 0 {
        anyhow::bail!("search.exact_search_max_hits must be >= 1");
    }
    if config.registry_cache.max_entries == 0 {
        anyhow::bail!("registry_cache.max_entries must be >= 1");
    }
    if config.compression.max_events_in_output == 0 {
        anyhow::bail!("compression.max_events_in_output must be >= 1");
    }
    if config.index.partition_prefix.is_empty() {
        anyhow::bail!("index.partition_prefix must be non-empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.search.knn_default_k, 8);
        assert_eq!(config.search.exact_search_max_hits, 1000);
        assert_eq!(config.registry_cache.ttl_secs, 300);
        assert_eq!(config.compression.max_events_in_output, 30);
        assert_eq!(config.index.partition_pattern(), "activity-*");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            model = "text-embedding-3-small"
            dims = 768

            [search]
            knn_default_k = 4
            "#,
        )
        .unwrap();
        validate(&config).unwrap();
        assert_eq!(config.embedding.dims, 768);
        assert_eq!(config.search.knn_default_k, 4);
        assert_eq!(config.search.knn_max_k, 20);
    }

    #[test]
    fn test_rejects_zero_dims() {
        let config: Config = toml::from_str("[embedding]\ndims = 0\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_default_k_above_max() {
        let config: Config =
            toml::from_str("[search]\nknn_default_k = 30\nknn_max_k = 20\n").unwrap();
        assert!(validate(&config).is_err());
    }
}
