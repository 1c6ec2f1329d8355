//! Events emitted by the task executor pipeline.

use netreq_core::ResilienceEvent;
use std::time::Instant;

/// An observable event from a [`crate::TaskExecutor`].
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    /// A fresh engine call is about to be attempted.
    Attempt {
        key: String,
        attempt: usize,
        timestamp: Instant,
    },
    /// An attempt failed with a retryable error and the engine will sleep
    /// before trying again.
    Retrying {
        key: String,
        attempt: usize,
        delay: std::time::Duration,
        timestamp: Instant,
    },
    /// The task completed successfully.
    Succeeded { key: String, timestamp: Instant },
    /// The task failed terminally.
    Failed { key: String, timestamp: Instant },
    /// A background stale-while-revalidate refresh failed; this is logged,
    /// not raised, since the caller already received the stale value.
    BackgroundRefreshFailed { key: String, timestamp: Instant },
}

impl ResilienceEvent for ExecutorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExecutorEvent::Attempt { .. } => "attempt",
            ExecutorEvent::Retrying { .. } => "retrying",
            ExecutorEvent::Succeeded { .. } => "succeeded",
            ExecutorEvent::Failed { .. } => "failed",
            ExecutorEvent::BackgroundRefreshFailed { .. } => "background_refresh_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ExecutorEvent::Attempt { timestamp, .. }
            | ExecutorEvent::Retrying { timestamp, .. }
            | ExecutorEvent::Succeeded { timestamp, .. }
            | ExecutorEvent::Failed { timestamp, .. }
            | ExecutorEvent::BackgroundRefreshFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            ExecutorEvent::Attempt { key, .. }
            | ExecutorEvent::Retrying { key, .. }
            | ExecutorEvent::Succeeded { key, .. }
            | ExecutorEvent::Failed { key, .. }
            | ExecutorEvent::BackgroundRefreshFailed { key, .. } => key,
        }
    }
}
