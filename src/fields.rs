//! Field-path resolution for heterogeneous identifier naming conventions.
//!
//! Documents in the store spell the same business key many ways:
//! `order_id`, `orderId`, `order-id`, `OrderId`, nested under `metadata`
//! or under structured sub-objects like `object`/`correlation`/`actor`.
//! Rather than hard-coding every spelling per identifier type, the
//! resolver composes a convention set (case styles × container prefixes ×
//! explicit overrides) into the candidate path list an exact search must
//! probe.
//!
//! All functions here are pure and deterministic; the same identifier type
//! and [`FieldMappingConfig`] always produce the same path list in the
//! same order.

use std::collections::HashMap;

use serde::Deserialize;

/// Which naming conventions and container prefixes to expand.
#[derive(Debug, Clone, Deserialize)]
pub struct Conventions {
    #[serde(default = "default_true")]
    pub snake_case: bool,
    #[serde(default = "default_true")]
    pub camel_case: bool,
    #[serde(default = "default_true")]
    pub kebab_case: bool,
    #[serde(default = "default_true")]
    pub pascal_case: bool,
    /// Container paths holding free-form metadata (e.g. `metadata`).
    #[serde(default = "default_metadata_paths")]
    pub metadata_paths: Vec<String>,
    /// Container paths holding structured sub-objects.
    #[serde(default = "default_object_paths")]
    pub object_paths: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_metadata_paths() -> Vec<String> {
    vec!["metadata".to_string()]
}

fn default_object_paths() -> Vec<String> {
    vec![
        "object".to_string(),
        "correlation".to_string(),
        "actor".to_string(),
    ]
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            snake_case: true,
            camel_case: true,
            kebab_case: true,
            pascal_case: true,
            metadata_paths: default_metadata_paths(),
            object_paths: default_object_paths(),
        }
    }
}

/// Field-mapping configuration: explicit per-type overrides plus the
/// convention set used for everything else.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldMappingConfig {
    /// Explicit identifier-type → field-path overrides. An entry here is
    /// returned verbatim and bypasses all convention expansion.
    #[serde(default)]
    pub explicit: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub conventions: Conventions,
}

/// Convert camelCase or PascalCase to snake_case.
///
/// `"orderId"` → `"order_id"`, `"OrderId"` → `"order_id"`.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out.strip_prefix('_').map(str::to_string).unwrap_or(out)
}

/// Convert snake_case, kebab-case, or PascalCase to camelCase.
///
/// Input that is already camelCase is returned unchanged, so the
/// conversion is idempotent and never re-splits `"orderId"` into
/// `"orderid"`.
pub fn to_camel_case(s: &str) -> String {
    let already_camel = s
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false)
        && !s.contains(['-', '_']);
    if already_camel {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '-' || c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    if let Some(first) = out.chars().next() {
        if first.is_ascii_uppercase() {
            out.replace_range(..first.len_utf8(), &first.to_ascii_lowercase().to_string());
        }
    }
    out
}

/// Convert to kebab-case.
///
/// `"orderId"` → `"order-id"`, `"order_id"` → `"order-id"`.
pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out.strip_prefix('-').map(str::to_string).unwrap_or(out)
}

/// Convert to PascalCase.
///
/// `"orderId"` → `"OrderId"`, `"order_id"` → `"OrderId"`.
pub fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => camel,
    }
}

/// Known semantic aliases: some identifier types also appear under a
/// generic field name in structured sub-objects.
fn alias_field(identifier_type: &str) -> Option<&'static str> {
    match identifier_type {
        "shipmentId" => Some("resourceId"),
        _ => None,
    }
}

/// Resolve an identifier type to the set of document field paths that
/// might hold its value.
///
/// Explicit overrides win verbatim. Otherwise each enabled case style
/// produces a leaf name, each leaf name is additionally prefixed with
/// every configured metadata and object container, and known semantic
/// aliases add their own container-prefixed variants. The result is
/// deduplicated with insertion order preserved.
///
/// An identifier type with no override and no enabled convention yields
/// an empty list, which callers must treat as "no match possible".
pub fn resolve_paths(config: &FieldMappingConfig, identifier_type: &str) -> Vec<String> {
    if let Some(explicit) = config.explicit.get(identifier_type) {
        return explicit.clone();
    }

    let conventions = &config.conventions;
    let mut leaf_names: Vec<String> = Vec::new();
    if conventions.snake_case {
        leaf_names.push(to_snake_case(identifier_type));
    }
    if conventions.camel_case {
        leaf_names.push(to_camel_case(identifier_type));
    }
    if conventions.kebab_case {
        leaf_names.push(to_kebab_case(identifier_type));
    }
    if conventions.pascal_case {
        leaf_names.push(to_pascal_case(identifier_type));
    }

    let mut paths: Vec<String> = Vec::new();
    let push_unique = |paths: &mut Vec<String>, path: String| {
        if !paths.contains(&path) {
            paths.push(path);
        }
    };

    for name in &leaf_names {
        push_unique(&mut paths, name.clone());
    }
    for container in &conventions.metadata_paths {
        for name in &leaf_names {
            push_unique(&mut paths, format!("{}.{}", container, name));
        }
    }
    for container in &conventions.object_paths {
        for name in &leaf_names {
            push_unique(&mut paths, format!("{}.{}", container, name));
        }
    }

    if let Some(alias) = alias_field(identifier_type) {
        let mut alias_names: Vec<String> = Vec::new();
        if conventions.camel_case {
            alias_names.push(to_camel_case(alias));
        }
        if conventions.snake_case {
            alias_names.push(to_snake_case(alias));
        }
        for container in &conventions.object_paths {
            for name in &alias_names {
                push_unique(&mut paths, format!("{}.{}", container, name));
            }
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("orderId"), "order_id");
        assert_eq!(to_snake_case("OrderId"), "order_id");
        assert_eq!(to_snake_case("order_id"), "order_id");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("orderId"), "orderId");
        assert_eq!(to_camel_case("order_id"), "orderId");
        assert_eq!(to_camel_case("order-id"), "orderId");
        assert_eq!(to_camel_case("OrderId"), "orderId");
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(to_kebab_case("orderId"), "order-id");
        assert_eq!(to_kebab_case("order_id"), "order-id");
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("orderId"), "OrderId");
        assert_eq!(to_pascal_case("order_id"), "OrderId");
    }

    #[test]
    fn test_case_roundtrip_converges() {
        // snake(camel(x)) and camel(snake(x)) must converge after one
        // application each, never oscillate.
        for input in ["orderId", "order_id", "OrderId", "order-id"] {
            let snake = to_snake_case(&to_camel_case(input));
            assert_eq!(snake, to_snake_case(&to_camel_case(&snake)));
            let camel = to_camel_case(&to_snake_case(input));
            assert_eq!(camel, to_camel_case(&to_snake_case(&camel)));
        }
    }

    #[test]
    fn test_resolve_paths_deterministic() {
        let config = FieldMappingConfig::default();
        let first = resolve_paths(&config, "orderId");
        let second = resolve_paths(&config, "orderId");
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_resolve_paths_contains_variants() {
        let config = FieldMappingConfig::default();
        let paths = resolve_paths(&config, "orderId");
        assert!(paths.contains(&"order_id".to_string()));
        assert!(paths.contains(&"orderId".to_string()));
        assert!(paths.contains(&"order-id".to_string()));
        assert!(paths.contains(&"OrderId".to_string()));
        assert!(paths.contains(&"metadata.order_id".to_string()));
        assert!(paths.contains(&"object.orderId".to_string()));
        assert!(paths.contains(&"correlation.orderId".to_string()));
        assert!(paths.contains(&"actor.orderId".to_string()));
    }

    #[test]
    fn test_resolve_paths_no_duplicates() {
        let config = FieldMappingConfig::default();
        // "email" has identical snake/camel/kebab leaf forms.
        let paths = resolve_paths(&config, "email");
        let mut deduped = paths.clone();
        deduped.dedup();
        let mut sorted = paths.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), paths.len());
        assert_eq!(deduped.len(), paths.len());
    }

    #[test]
    fn test_explicit_override_wins() {
        let mut config = FieldMappingConfig::default();
        config.explicit.insert(
            "orderId".to_string(),
            vec!["custom.order".to_string()],
        );
        assert_eq!(
            resolve_paths(&config, "orderId"),
            vec!["custom.order".to_string()]
        );
    }

    #[test]
    fn test_shipment_alias_maps_to_resource_id() {
        let config = FieldMappingConfig::default();
        let paths = resolve_paths(&config, "shipmentId");
        assert!(paths.contains(&"object.resourceId".to_string()));
        assert!(paths.contains(&"object.resource_id".to_string()));
    }

    #[test]
    fn test_all_conventions_disabled_yields_empty() {
        let config = FieldMappingConfig {
            explicit: HashMap::new(),
            conventions: Conventions {
                snake_case: false,
                camel_case: false,
                kebab_case: false,
                pascal_case: false,
                metadata_paths: vec![],
                object_paths: vec![],
            },
        };
        assert!(resolve_paths(&config, "mysteryKey").is_empty());
    }
}
