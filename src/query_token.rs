//! Opaque query-string codec.
//!
//! Encodes an exact-search request into a single URL-safe token that a
//! caller can hand back later to re-run or attribute the query. The
//! token carries a short cache key derived from the identifier pair
//! alone, so two tokens minted at different times for the same query
//! still share a cache identity.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The decoded contents of a query token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryToken {
    pub identifier: String,
    pub identifier_type: String,
    /// ISO-8601 mint time.
    pub timestamp: String,
    /// First 16 hex characters of the SHA-256 of the identifier pair.
    pub cache_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheKeyInput<'a> {
    identifier: &'a str,
    identifier_type: &'a str,
}

/// Derive the 16-character cache key for an identifier pair.
pub fn cache_key(identifier: &str, identifier_type: &str) -> String {
    let input = CacheKeyInput {
        identifier,
        identifier_type,
    };
    // Field order is fixed by the struct, so the digest is stable.
    let canonical = serde_json::to_string(&input).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Mint a token for an identifier pair at the current time.
pub fn encode_query(identifier: &str, identifier_type: &str) -> Result<String> {
    let token = QueryToken {
        identifier: identifier.to_string(),
        identifier_type: identifier_type.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        cache_key: cache_key(identifier, identifier_type),
    };
    let json = serde_json::to_vec(&token).context("serializing query token")?;
    Ok(BASE64.encode(json))
}

/// Decode and validate a previously minted token.
pub fn decode_query(encoded: &str) -> Result<QueryToken> {
    let json = BASE64
        .decode(encoded)
        .context("query token is not valid base64")?;
    let token: QueryToken =
        serde_json::from_slice(&json).context("query token is not valid JSON")?;
    if token.identifier.is_empty() || token.identifier_type.is_empty() {
        bail!("query token is missing identifier fields");
    }
    Ok(token)
}
