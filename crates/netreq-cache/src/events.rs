//! Events emitted by the cache store.

use netreq_core::ResilienceEvent;
use std::time::Instant;

/// An observable event from a [`crate::CacheStore`].
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A read found a live, unexpired entry.
    Hit {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A read found no entry, or the entry had expired.
    Miss {
        pattern_name: String,
        timestamp: Instant,
    },
    /// An entry was evicted to make room for a new write, or removed
    /// because it had expired.
    Eviction {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Eviction { .. } => "eviction",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Eviction { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CacheEvent::Hit { pattern_name, .. }
            | CacheEvent::Miss { pattern_name, .. }
            | CacheEvent::Eviction { pattern_name, .. } => pattern_name,
        }
    }
}
