//! Control gate: debounce, throttle and single-flight deduplication.
//!
//! [`ControlGate`] is consulted once per task, before the task executor
//! reads the cache or sends anything over the wire. A task is checked for
//! an already-in-flight duplicate first (so followers never pay a throttle
//! or debounce delay of their own — they simply attach); the leader then
//! sleeps out the throttle window, then the debounce window, before being
//! told to proceed.
//!
//! # Example
//!
//! ```
//! use netreq_gate::{ControlGate, ControlPolicy, GateOutcome};
//!
//! # async fn example() {
//! let gate = ControlGate::new();
//! let policy = ControlPolicy {
//!     debounce: None,
//!     throttle: None,
//!     dedup: true,
//! };
//!
//! match gate.pass("user:42", &policy, None).await {
//!     GateOutcome::Proceed => { /* this caller does the work */ }
//!     GateOutcome::Join(_waiter) => { /* await the receiver for the shared result */ }
//!     GateOutcome::Cancelled => { /* superseded by a newer debounced call, or the caller's own token fired */ }
//! }
//! # }
//! ```
//!
//! # Prior Art
//!
//! The dedup half of this gate is also known as **singleflight** (Go's
//! `golang.org/x/sync/singleflight`) or request collapsing.

mod debounce;
mod events;
mod inflight;
mod throttle;

pub use events::GateEvent;
pub use inflight::SharedResult;

use debounce::DebounceTable;
use inflight::InFlight;
use netreq_core::EventListeners;
use std::time::{Duration, Instant};
use throttle::ThrottleTable;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// The gating policies to apply for a single task key.
#[derive(Debug, Clone, Default)]
pub struct ControlPolicy {
    /// Wait this long for no newer identically-keyed call to arrive before
    /// proceeding; superseded by any later call for the same key.
    pub debounce: Option<Duration>,
    /// Sleep out the remainder of this interval since the key's last
    /// permitted start before proceeding.
    pub throttle: Option<Duration>,
    /// Coalesce concurrent calls for this key into one execution.
    pub dedup: bool,
}

/// The outcome of consulting the gate for one call.
pub enum GateOutcome {
    /// No policy blocked this call; the caller should proceed and, if
    /// `dedup` was requested, must call [`ControlGate::complete`] or
    /// [`ControlGate::cancel`] exactly once when done.
    Proceed,
    /// Another call is already in flight for this key; await this receiver
    /// for its shared result instead of doing the work again.
    Join(broadcast::Receiver<SharedResult>),
    /// A newer call for the same key superseded this one before its
    /// debounce window elapsed.
    Cancelled,
}

/// Debounce, throttle and single-flight dedup for a single logical task
/// stream, scoped to one `ControlGate` instance (there is no process-wide
/// singleton — each owner, typically one `NetworkClient`, holds its own).
pub struct ControlGate {
    debounce: DebounceTable,
    throttle: ThrottleTable,
    in_flight: InFlight,
    event_listeners: EventListeners<GateEvent>,
}

impl ControlGate {
    /// Creates a new, empty gate.
    pub fn new() -> Self {
        Self {
            debounce: DebounceTable::new(),
            throttle: ThrottleTable::new(),
            in_flight: InFlight::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Registers a listener for gate events.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: netreq_core::EventListener<GateEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    /// Checks dedup for `key` first (a follower attaches and returns
    /// immediately, never touching throttle or debounce); the leader (or
    /// any caller when dedup is off) then sleeps out throttle, then
    /// debounce, before being told to proceed.
    ///
    /// The atomicity of the dedup check-then-register step is provided by
    /// [`InFlight::try_join`]: the leader's placeholder is installed under
    /// the same lock acquisition that checks for an existing one, so no
    /// second caller can race past the check.
    ///
    /// `cancel_token`, if given, is raced against every suspension point in
    /// this call (the throttle sleep and the debounce sleep); a leader
    /// cancelled mid-wait releases its dedup slot the same way a
    /// debounce-superseded leader does, so a follower never joins a call
    /// that will never complete.
    pub async fn pass(&self, key: &str, policy: &ControlPolicy, cancel_token: Option<&CancellationToken>) -> GateOutcome {
        if policy.dedup {
            if let Some(receiver) = self.in_flight.try_join(key) {
                self.event_listeners.emit(&GateEvent::DedupWaiter {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });
                return GateOutcome::Join(receiver);
            }
            self.event_listeners.emit(&GateEvent::DedupLeader {
                key: key.to_string(),
                timestamp: Instant::now(),
            });
        }

        if let Some(interval) = policy.throttle {
            let delay = tokio::select! {
                delay = self.throttle.wait(key, interval) => delay,
                _ = cancelled(cancel_token) => {
                    if policy.dedup {
                        self.in_flight.cancel(key);
                    }
                    return GateOutcome::Cancelled;
                }
            };
            if !delay.is_zero() {
                self.event_listeners.emit(&GateEvent::Throttled {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                    delay,
                });
            }
        }

        if let Some(delay) = policy.debounce {
            let survived = tokio::select! {
                survived = self.debounce.wait(key, delay) => survived,
                _ = cancelled(cancel_token) => {
                    if policy.dedup {
                        self.in_flight.cancel(key);
                    }
                    return GateOutcome::Cancelled;
                }
            };
            if !survived {
                self.event_listeners.emit(&GateEvent::DebounceSuperseded {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });
                if policy.dedup {
                    self.in_flight.cancel(key);
                }
                return GateOutcome::Cancelled;
            }
        }

        GateOutcome::Proceed
    }

    /// Completes a leader's dedup slot, delivering `result` to every
    /// waiter. Only call this if `pass` returned `GateOutcome::Proceed` for
    /// a dedup-enabled policy.
    pub fn complete(&self, key: &str, result: SharedResult) {
        self.in_flight.complete(key, result);
    }

    /// Removes a leader's dedup slot without delivering a result, used when
    /// the leader was cancelled. Waiters see their receiver close and must
    /// treat that as a cancellation.
    pub fn cancel(&self, key: &str) {
        self.in_flight.cancel(key);
    }
}

impl Default for ControlGate {
    fn default() -> Self {
        Self::new()
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(t) => t.cancelled().await,
        None => std::future::pending().await,
    }
}
