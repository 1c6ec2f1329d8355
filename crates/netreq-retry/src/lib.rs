//! Retry policy, backoff math and idempotency classification.
//!
//! This crate holds the *decision* half of retrying a failed request:
//! [`RetryPolicy`] tells you how long to wait and how many attempts are
//! allowed, and [`classify`] tells you whether a given error on a given
//! attempt should be retried at all. The retry *loop* itself — attempt
//! counting, per-attempt and total timeouts, the 401-refresh special case —
//! lives in `netreq-executor`, which drives this policy from inside its
//! task pipeline.
//!
//! # Example
//!
//! ```
//! use netreq_retry::{classify, RetryDecision, RetryPolicy};
//! use netreq_core::NetError;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::Exponential {
//!     base: Duration::from_millis(100),
//!     max: Duration::from_secs(5),
//!     multiplier: 2.0,
//!     max_attempts: 3,
//! };
//!
//! let error = NetError::Timeout(Duration::from_secs(1));
//! match classify(&policy, &error, true, 0) {
//!     RetryDecision::Retry(_delay) => { /* sleep then try again */ }
//!     RetryDecision::GiveUp => { /* surface the error */ }
//!     RetryDecision::Exhausted => { /* surface RetryExhausted */ }
//! }
//! ```

mod events;
mod policy;

pub use events::RetryEvent;
pub use policy::{classify, is_idempotent_method, RetryDecision, RetryPolicy};
