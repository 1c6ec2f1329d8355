//! Throttle: space out initiations per key, by sleeping rather than
//! rejecting.
//!
//! Throttle gates when a task is allowed to *start*, not when it finishes —
//! a long-running call does not extend the window, and a call that starts
//! and fails still consumes the window the same as a successful one.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub(crate) struct ThrottleTable {
    last_fire: Mutex<HashMap<String, Instant>>,
}

impl ThrottleTable {
    pub(crate) fn new() -> Self {
        Self {
            last_fire: Mutex::new(HashMap::new()),
        }
    }

    /// Sleeps out whatever remains of `key`'s throttle window, then records
    /// the current time as the new last-fire time. Returns the duration
    /// actually slept (`Duration::ZERO` if the window had already elapsed).
    pub(crate) async fn wait(&self, key: &str, interval: Duration) -> Duration {
        let remaining = {
            let last_fire = self.last_fire.lock();
            match last_fire.get(key) {
                Some(last) => interval.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            }
        };

        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }

        self.last_fire.lock().insert(key.to_string(), Instant::now());
        remaining
    }
}
