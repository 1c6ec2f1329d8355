//! `RequestSpec`: the immutable input to the execution pipeline.

use bytes::Bytes;
use netreq_cachekey::{BodyShape, BodySpec, QueryMap};
use std::collections::BTreeMap;

/// How the caller's auth context should be attached to a request on every
/// attempt, including after a token refresh.
#[derive(Debug, Clone)]
pub struct AuthBinding {
    /// Identifies which authentication strategy to use (e.g. "bearer").
    pub strategy: String,
    /// Opaque context handle the strategy uses to look up credentials.
    pub context: String,
}

/// A fully-specified, immutable request. Cloned into the pipeline at
/// submission time; nothing downstream mutates it.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: String,
    pub base_url: String,
    pub path: String,
    /// Preserves insertion order for transmission; does not affect the
    /// derived `CacheKey`.
    pub headers: Vec<(String, String)>,
    pub query: QueryMap,
    pub body: Option<Bytes>,
    pub body_shape: BodyShape,
    pub timeout: Option<std::time::Duration>,
    pub auth: Option<AuthBinding>,
}

impl RequestSpec {
    /// Creates a request spec with no query, body, timeout or auth binding.
    pub fn new(method: impl Into<String>, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            base_url: base_url.into(),
            path: path.into(),
            headers: Vec::new(),
            query: BTreeMap::new(),
            body: None,
            body_shape: BodyShape::Opaque,
            timeout: None,
            auth: None,
        }
    }

    /// Whether this method is idempotent by `RequestSpec`'s own override, or
    /// the HTTP-method default if none was set.
    pub fn is_idempotent(&self, override_idempotent: Option<bool>) -> bool {
        override_idempotent.unwrap_or_else(|| netreq_retry::is_idempotent_method(&self.method))
    }

    /// The `BodySpec` view of this request's body, for `CacheKey` derivation.
    pub fn body_spec(&self) -> Option<BodySpec> {
        self.body.as_ref().map(|bytes| BodySpec {
            shape: self.body_shape,
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_idempotency_follows_http_method() {
        let get = RequestSpec::new("GET", "https://api.example.com", "/x");
        assert!(get.is_idempotent(None));

        let post = RequestSpec::new("POST", "https://api.example.com", "/x");
        assert!(!post.is_idempotent(None));
    }

    #[test]
    fn explicit_override_wins_over_method_default() {
        let post = RequestSpec::new("POST", "https://api.example.com", "/x");
        assert!(post.is_idempotent(Some(true)));

        let get = RequestSpec::new("GET", "https://api.example.com", "/x");
        assert!(!get.is_idempotent(Some(false)));
    }
}
