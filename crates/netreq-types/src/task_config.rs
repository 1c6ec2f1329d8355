//! `TaskConfig`: the per-call knobs that shape how a request is executed.

use netreq_retry::RetryPolicy;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a task's lifetime relates to the scope that submitted it.
#[derive(Clone)]
pub enum Lifecycle {
    /// Cancelled when `token` is cancelled, e.g. because the object that
    /// owns this request was dropped.
    BoundToOwner(CancellationToken),
    /// Ignores ambient cancellation from enclosing scopes; only an explicit
    /// caller-held cancellation can stop it.
    Persistent,
    /// No automatic cancellation wiring; the default.
    Manual,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle::Manual
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::BoundToOwner(_) => write!(f, "Lifecycle::BoundToOwner"),
            Lifecycle::Persistent => write!(f, "Lifecycle::Persistent"),
            Lifecycle::Manual => write!(f, "Lifecycle::Manual"),
        }
    }
}

/// Relative scheduling priority. The core only carries this as a hint for
/// callers building their own scheduling layer on top; it does not reorder
/// gate or cache behavior itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Debounce, throttle and dedup settings for a task, plus a scheduling hint.
#[derive(Debug, Clone, Default)]
pub struct ControlPolicy {
    pub debounce: Option<Duration>,
    pub throttle: Option<Duration>,
    pub deduplicate: bool,
    pub priority: Priority,
}

impl ControlPolicy {
    /// The subset of this policy the gate actually acts on.
    pub fn to_gate_policy(&self) -> netreq_gate::ControlPolicy {
        netreq_gate::ControlPolicy {
            debounce: self.debounce,
            throttle: self.throttle,
            dedup: self.deduplicate,
        }
    }
}

/// How a task interacts with the response cache.
#[derive(Debug, Clone, Default)]
pub enum CachePolicy {
    /// Always go to the network.
    #[default]
    None,
    /// Return a cached value if present and not older than `max_age`;
    /// otherwise go to the network and cache the result with that TTL.
    CacheFirst(Duration),
    /// Return any cached value (fresh or stale) immediately if present, and
    /// refresh in the background; write the refreshed value with no TTL.
    StaleWhileRevalidate,
}

/// The full set of per-task knobs consumed by the executor.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub lifecycle: Lifecycle,
    pub control: ControlPolicy,
    pub cache: CachePolicy,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Manual,
            control: ControlPolicy::default(),
            cache: CachePolicy::default(),
            retry: RetryPolicy::None,
            timeout: None,
            total_timeout: None,
        }
    }
}

/// Builder for [`TaskConfig`], matching the teacher's `XConfigBuilder`
/// construction idiom.
#[derive(Debug, Default)]
pub struct TaskConfigBuilder {
    config: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.config.lifecycle = lifecycle;
        self
    }

    pub fn debounce(mut self, delay: Duration) -> Self {
        self.config.control.debounce = Some(delay);
        self
    }

    pub fn throttle(mut self, interval: Duration) -> Self {
        self.config.control.throttle = Some(interval);
        self
    }

    pub fn deduplicate(mut self, enabled: bool) -> Self {
        self.config.control.deduplicate = enabled;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.config.control.priority = priority;
        self
    }

    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.config.cache = policy;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.config.total_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.config
    }
}
