//! Single-flight token refresh coordination.
//!
//! [`TokenRefreshCoordinator`] ensures that when many concurrent requests
//! observe an HTTP 401 at once, exactly one refresh happens; the rest await
//! its result. This is the same single-flight shape as `netreq-gate`'s dedup
//! registry, specialized to one slot per coordinator instance instead of a
//! map keyed by `CacheKey` — there is only ever one "current token" to
//! refresh.

mod events;

pub use events::RefreshEvent;

use netreq_core::{EventListeners, NetError};
use netreq_types::TokenRefresher;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::Mutex;

/// Per spec, any refresh failure surfaces to the caller as
/// `NetError::AuthenticationFailed` regardless of the underlying cause, so
/// the shared slot only needs to carry the failure message — no need to
/// share a cloneable `NetError` across waiters.
type SharedResult = Result<String, String>;

/// Coalesces concurrent refresh attempts into one.
pub struct TokenRefreshCoordinator {
    in_flight: Mutex<Option<broadcast::Sender<SharedResult>>>,
    event_listeners: EventListeners<RefreshEvent>,
}

impl TokenRefreshCoordinator {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(None),
            event_listeners: EventListeners::new(),
        }
    }

    /// Registers a listener for refresh events.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: netreq_core::EventListener<RefreshEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    /// Refreshes the token, or awaits an already-in-flight refresh if one
    /// exists. At most one call to `refresher.refresh()` is ever in flight
    /// at a time for a given coordinator.
    pub async fn refresh(&self, refresher: &dyn TokenRefresher) -> Result<String, NetError> {
        let mut receiver = {
            let mut slot = self.in_flight.lock().await;
            if let Some(sender) = slot.as_ref() {
                self.event_listeners.emit(&RefreshEvent::Joined {
                    timestamp: std::time::Instant::now(),
                });
                sender.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                *slot = Some(tx.clone());
                drop(slot);

                self.event_listeners.emit(&RefreshEvent::Started {
                    timestamp: std::time::Instant::now(),
                });

                let result = refresher.refresh().await;
                let shared: SharedResult = result.map_err(|e| e.to_string());

                self.event_listeners.emit(if shared.is_ok() {
                    &RefreshEvent::Succeeded {
                        timestamp: std::time::Instant::now(),
                    }
                } else {
                    &RefreshEvent::Failed {
                        timestamp: std::time::Instant::now(),
                    }
                });

                *self.in_flight.lock().await = None;
                let _ = tx.send(shared.clone());

                return shared.map_err(NetError::AuthenticationFailed);
            }
        };

        receiver
            .recv()
            .await
            .map_err(|_| NetError::Cancelled)
            .and_then(|result| result.map_err(NetError::AuthenticationFailed))
    }
}

impl Default for TokenRefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
