//! Single-flight in-flight request registry.
//!
//! Adapted from the broadcast-channel coalescing idiom: the first caller
//! for a key becomes the "leader" and creates a placeholder broadcast slot
//! before doing any work, so a second caller arriving between the leader's
//! registration and its completion always finds the placeholder rather than
//! racing to also become leader.

use bytes::Bytes;
use hashbrown::HashMap;
use netreq_core::NetError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The result shared with every waiter on a coalesced key. `NetError` is
/// wrapped in `Arc` purely so the broadcast channel's `Clone` bound is
/// satisfied without requiring `NetError: Clone`.
pub type SharedResult = Result<Bytes, Arc<NetError>>;

pub(crate) struct InFlight {
    requests: Mutex<HashMap<String, broadcast::Sender<SharedResult>>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to join an in-flight request for `key`. Returns `Some`
    /// receiver if another caller is already the leader; otherwise installs
    /// a placeholder and returns `None`, meaning the caller is now the
    /// leader and responsible for calling [`InFlight::complete`] or
    /// [`InFlight::cancel`] exactly once.
    pub(crate) fn try_join(&self, key: &str) -> Option<broadcast::Receiver<SharedResult>> {
        let mut requests = self.requests.lock();
        if let Some(sender) = requests.get(key) {
            Some(sender.subscribe())
        } else {
            let (tx, _rx) = broadcast::channel(1);
            requests.insert(key.to_string(), tx);
            None
        }
    }

    /// Completes the leader's work, notifying every waiter and removing the
    /// placeholder.
    pub(crate) fn complete(&self, key: &str, result: SharedResult) {
        let mut requests = self.requests.lock();
        if let Some(sender) = requests.remove(key) {
            let _ = sender.send(result);
        }
    }

    /// Removes the placeholder without notifying anyone — used when the
    /// leader is cancelled before producing a result. Waiters observe the
    /// channel closing and must treat that as `NetError::Cancelled`.
    pub(crate) fn cancel(&self, key: &str) {
        let mut requests = self.requests.lock();
        requests.remove(key);
    }
}
