//! TTL-based cache store for request/response bytes.
//!
//! [`CacheStore`] stores raw response bytes keyed by [`CacheKey`], with an
//! optional time-to-live and a pluggable eviction policy once the store
//! reaches its configured capacity. It performs no (de)serialization of its
//! own — callers hand it bytes and get bytes back.
//!
//! # Example
//!
//! ```
//! use netreq_cache::CacheStore;
//! use netreq_cachekey::derive;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let mut store = CacheStore::builder()
//!     .max_size(100)
//!     .ttl(Duration::from_secs(60))
//!     .on_hit(|| println!("cache hit"))
//!     .build();
//!
//! let key = derive("GET", "https://api.example.com", "/v1/users", None, None);
//! store.write(key, Bytes::from_static(b"response body"), None);
//! assert_eq!(store.read(&key), Some(Bytes::from_static(b"response body")));
//! ```

mod config;
mod eviction;
mod events;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use eviction::EvictionPolicy;
pub use events::CacheEvent;

use bytes::Bytes;
use netreq_cachekey::CacheKey;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::RawStore;

/// A mutually-exclusive, TTL-aware cache of response bytes.
///
/// Internally guarded by a single [`parking_lot::Mutex`] so reads and
/// writes observe a consistent view of the store; callers never see the
/// lock or the raw map, only the `read`/`write`/`invalidate`/`clear` API.
pub struct CacheStore {
    inner: Mutex<RawStore<CacheKey, Bytes>>,
    config: Arc<CacheConfig>,
}

impl CacheStore {
    pub(crate) fn new(config: CacheConfig) -> Self {
        let inner = RawStore::new(config.max_size, config.ttl, config.eviction_policy);
        Self {
            inner: Mutex::new(inner),
            config: Arc::new(config),
        }
    }

    /// Starts building a new cache store.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Reads a value from the cache if present and not expired.
    ///
    /// Emits a [`CacheEvent::Hit`] or [`CacheEvent::Miss`] accordingly.
    pub fn read(&self, key: &CacheKey) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        let found = inner.get(key);

        let event = if found.is_some() {
            CacheEvent::Hit {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            }
        } else {
            CacheEvent::Miss {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            }
        };
        self.config.event_listeners.emit(&event);

        found
    }

    /// Writes a value into the cache. `ttl_override`, if given, is ignored
    /// by this store — TTL is fixed per-store at construction time,
    /// matching [`crate::CacheConfig::ttl`]. The parameter exists so
    /// callers (e.g. per-request cache policies) can express "don't cache
    /// this" by skipping the call entirely; it is not a per-entry TTL knob.
    pub fn write(&self, key: CacheKey, value: Bytes, _ttl_override: Option<Duration>) {
        let mut inner = self.inner.lock();
        let was_full = inner.len() >= self.config.max_size;
        inner.insert(key, value);

        if was_full {
            let event = CacheEvent::Eviction {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            };
            self.config.event_listeners.emit(&event);
        }
    }

    /// Removes a single entry, returning whether it was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.inner.lock().invalidate(key)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Proactively removes every entry whose TTL has elapsed. Returns the
    /// number of entries removed. Reads already treat expired entries as
    /// misses and remove them lazily; this is for callers that want to
    /// reclaim memory without waiting for a read to touch each key.
    pub fn cleanup_expired(&self) -> usize {
        self.inner.lock().cleanup_expired()
    }

    /// Returns the current number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
