//! Debounce: only the most recently scheduled call for a key survives.
//!
//! Each call bumps a per-key generation counter and sleeps for the debounce
//! delay. If a newer call bumps the generation again before the delay
//! elapses, the earlier awaiter observes its generation is stale and
//! reports itself cancelled in favor of the newer one — the
//! debounce-vs-dedup tie is resolved in favor of the newer caller.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct Slot {
    generation: u64,
    notify: Arc<Notify>,
}

pub(crate) struct DebounceTable {
    slots: Mutex<HashMap<String, Slot>>,
}

impl DebounceTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Waits out the debounce window for `key`. Returns `true` if this call
    /// was still the most recent one when the window elapsed (it should
    /// proceed), `false` if a newer call superseded it first.
    pub(crate) async fn wait(&self, key: &str, delay: Duration) -> bool {
        let (generation, notify) = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                generation: 0,
                notify: Arc::new(Notify::new()),
            });
            slot.generation += 1;
            // Wake any earlier waiter on this key so it can re-check and
            // lose immediately instead of sleeping out its full window.
            slot.notify.notify_waiters();
            slot.notify = Arc::new(Notify::new());
            (slot.generation, Arc::clone(&slot.notify))
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = notify.notified() => {}
        }

        let mut slots = self.slots.lock();
        match slots.get(key) {
            Some(slot) if slot.generation == generation => {
                slots.remove(key);
                true
            }
            _ => false,
        }
    }
}
