//! Canonical cache key derivation.
//!
//! A [`CacheKey`] is a deterministic fingerprint of a request: the same
//! method, base URL, path, query parameters and body always produce the
//! same key regardless of the order the caller built them in. Two requests
//! that differ only in query-parameter or JSON-field order must derive to
//! the same key; two requests that differ in any semantic way must not.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

mod query;

pub use query::QueryValue;

/// A deterministic, order-independent fingerprint of a request.
///
/// Internally this is the first 16 bytes (128 bits) of a SHA-256 digest
/// over the request's canonical representation, hex-encoded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 16]);

impl CacheKey {
    /// Renders the key as a 32-character lowercase hex string.
    pub fn as_hex(&self) -> String {
        let mut s = String::with_capacity(32);
        for byte in self.0 {
            use std::fmt::Write;
            let _ = write!(s, "{byte:02x}");
        }
        s
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.as_hex())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

/// How a request body should be canonicalized before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// The body is a JSON document; it is parsed and re-serialized with
    /// sorted object keys so field order does not affect the key.
    Json,
    /// The body is opaque; its raw bytes are hashed as-is.
    Opaque,
}

/// A request body plus the hint needed to canonicalize it.
#[derive(Debug, Clone)]
pub struct BodySpec {
    pub shape: BodyShape,
    pub bytes: Vec<u8>,
}

/// A query parameter map. Top-level keys are sorted for canonicalization;
/// use [`QueryValue::Map`] for nested structures.
pub type QueryMap = BTreeMap<String, QueryValue>;

/// Derives a [`CacheKey`] from the logical parts of a request.
///
/// `query` keys are canonicalized in sorted order regardless of the map's
/// construction order (a `BTreeMap` already sorts, but this also holds for
/// nested [`QueryValue::Map`] values).
pub fn derive(
    method: &str,
    base_url: &str,
    path: &str,
    query: Option<&QueryMap>,
    body: Option<&BodySpec>,
) -> CacheKey {
    let mut canonical = String::new();
    canonical.push_str(&method.to_ascii_uppercase());
    canonical.push('\n');
    canonical.push_str(base_url.trim_end_matches('/'));
    canonical.push_str(path);
    canonical.push('\n');
    if let Some(query) = query {
        canonical.push_str(&query::canonicalize(query));
    }
    canonical.push('\n');
    if let Some(body) = body {
        canonical.push_str(&canonicalize_body(body));
    }

    hash(&canonical)
}

/// Derives a [`CacheKey`] from an already-materialized absolute URL (query
/// string included verbatim) plus an optional body. Used when the caller
/// has already assembled the final request URL and the query-canonicalization
/// pass in [`derive`] is unnecessary or has already happened upstream.
pub fn derive_from_materialized(method: &str, absolute_url: &str, body: Option<&BodySpec>) -> CacheKey {
    let mut canonical = String::new();
    canonical.push_str(&method.to_ascii_uppercase());
    canonical.push('\n');
    canonical.push_str(absolute_url);
    canonical.push('\n');
    if let Some(body) = body {
        canonical.push_str(&canonicalize_body(body));
    }

    hash(&canonical)
}

fn canonicalize_body(body: &BodySpec) -> String {
    match body.shape {
        BodyShape::Json => match serde_json::from_slice::<serde_json::Value>(&body.bytes) {
            Ok(value) => {
                let sorted = sort_json(value);
                // serde_json never escapes '/' by default, matching the
                // "no slash-escaping" canonicalization rule.
                serde_json::to_string(&sorted).unwrap_or_default()
            }
            // Not valid JSON despite the hint; fall back to raw bytes so we
            // still derive a stable (if less semantically meaningful) key.
            Err(_) => hex_bytes(&body.bytes),
        },
        BodyShape::Opaque => hex_bytes(&body.bytes),
    }
}

fn sort_json(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_json(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_json).collect()),
        other => other,
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{byte:02x}");
    }
    s
}

fn hash(canonical: &str) -> CacheKey {
    let digest = Sha256::digest(canonical.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    CacheKey(bytes)
}
