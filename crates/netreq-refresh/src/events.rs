use netreq_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a [`crate::TokenRefreshCoordinator`].
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// This caller started a new refresh; no refresh was already in flight.
    Started { timestamp: Instant },
    /// This caller joined an already in-flight refresh instead of starting
    /// its own.
    Joined { timestamp: Instant },
    /// A refresh completed successfully.
    Succeeded { timestamp: Instant },
    /// A refresh failed; every awaiter observes the same error.
    Failed { timestamp: Instant },
}

impl ResilienceEvent for RefreshEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RefreshEvent::Started { .. } => "started",
            RefreshEvent::Joined { .. } => "joined",
            RefreshEvent::Succeeded { .. } => "succeeded",
            RefreshEvent::Failed { .. } => "failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RefreshEvent::Started { timestamp }
            | RefreshEvent::Joined { timestamp }
            | RefreshEvent::Succeeded { timestamp }
            | RefreshEvent::Failed { timestamp } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        "token_refresh"
    }
}
