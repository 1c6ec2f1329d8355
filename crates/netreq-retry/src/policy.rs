//! Retry policy: backoff math, idempotency defaults, and error classification.

use netreq_core::NetError;
use std::time::Duration;

/// How to space out retry attempts, and how many to allow.
///
/// This is a closed-form enum rather than a pluggable `IntervalFunction`
/// trait: nothing in this system needs a user-supplied backoff function,
/// so the trait-object indirection isn't carried forward.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// Never retry.
    None,
    /// A constant delay between attempts.
    Fixed {
        delay: Duration,
        max_attempts: usize,
    },
    /// Delay grows by `multiplier` per attempt, capped at `max`:
    /// `min(base * multiplier^attempt, max)`, exactly — no jitter.
    Exponential {
        base: Duration,
        max: Duration,
        multiplier: f64,
        max_attempts: usize,
    },
}

impl RetryPolicy {
    /// The maximum number of attempts this policy allows (including the
    /// initial try).
    pub fn max_attempts(&self) -> usize {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }

    /// The delay to sleep before attempt `attempt + 1`, where `attempt` is
    /// the zero-based index of the attempt that just failed.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential {
                base,
                max,
                multiplier,
                ..
            } => {
                let factor = multiplier.powi(attempt as i32);
                let scaled = base.as_secs_f64() * factor;
                let capped = scaled.min(max.as_secs_f64());
                Duration::from_secs_f64(capped)
            }
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts have
    /// already been made.
    pub fn can_retry(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts()
    }
}

/// Whether an HTTP method is idempotent by default. `RequestSpec` may
/// override this per-request.
pub fn is_idempotent_method(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "GET" | "HEAD" | "OPTIONS" | "TRACE" | "PUT" | "DELETE"
    )
}

/// What the retry engine should do after an attempt fails.
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    Retry(Duration),
    /// Do not retry; surface the error as-is (non-retryable condition).
    GiveUp,
    /// Retries are exhausted; surface `RetryExhausted(lastError)`.
    Exhausted,
}

/// Classifies what to do after `error` on `attempt` (zero-based), given
/// whether the request is idempotent. Callers handle HTTP 401 /
/// cancellation separately, before reaching this function — those
/// conditions are not retry-policy decisions.
pub fn classify(policy: &RetryPolicy, error: &NetError, idempotent: bool, attempt: usize) -> RetryDecision {
    if !idempotent || !error.is_retryable() {
        return RetryDecision::GiveUp;
    }
    if !policy.can_retry(attempt) {
        return RetryDecision::Exhausted;
    }
    RetryDecision::Retry(policy.delay(attempt))
}
