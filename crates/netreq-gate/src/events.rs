//! Events emitted by the control gate.

use netreq_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// An observable event from a [`crate::ControlGate`].
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// This caller became the single-flight leader for its key.
    DedupLeader { key: String, timestamp: Instant },
    /// This caller joined an already in-flight request for its key.
    DedupWaiter { key: String, timestamp: Instant },
    /// This caller was superseded by a newer debounced call for the key.
    DebounceSuperseded { key: String, timestamp: Instant },
    /// This caller was delayed by the throttle window before proceeding.
    Throttled {
        key: String,
        timestamp: Instant,
        delay: Duration,
    },
}

impl ResilienceEvent for GateEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GateEvent::DedupLeader { .. } => "dedup_leader",
            GateEvent::DedupWaiter { .. } => "dedup_waiter",
            GateEvent::DebounceSuperseded { .. } => "debounce_superseded",
            GateEvent::Throttled { .. } => "throttled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            GateEvent::DedupLeader { timestamp, .. }
            | GateEvent::DedupWaiter { timestamp, .. }
            | GateEvent::DebounceSuperseded { timestamp, .. }
            | GateEvent::Throttled { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            GateEvent::DedupLeader { key, .. }
            | GateEvent::DedupWaiter { key, .. }
            | GateEvent::DebounceSuperseded { key, .. }
            | GateEvent::Throttled { key, .. } => key,
        }
    }
}
