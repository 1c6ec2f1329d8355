//! Spawner trait for running futures on a runtime.

use std::future::Future;
use tokio::task::JoinHandle;

/// Abstracts over different task-spawning strategies, so the pipeline and
/// the orchestrator can run on a dedicated runtime, a thread pool, or
/// whatever handle the caller hands them, rather than hard-coding
/// `tokio::spawn`.
///
/// # Example
///
/// ```rust,no_run
/// use netreq_executor::Spawner;
/// use tokio::runtime::Handle;
///
/// let handle = Handle::current();
/// ```
pub trait Spawner: Clone + Send + Sync + 'static {
    /// Spawns a future onto this executor, returning a handle that can be
    /// awaited for its result.
    fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static;
}

/// `tokio::runtime::Handle` spawns futures as new tasks on that runtime.
impl Spawner for tokio::runtime::Handle {
    fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::runtime::Handle::spawn(self, future)
    }
}

/// A spawner wrapper that captures the current runtime handle at
/// construction time, for callers that don't want to pass a `Handle`
/// around explicitly.
#[derive(Clone)]
pub struct CurrentRuntime {
    handle: tokio::runtime::Handle,
}

impl CurrentRuntime {
    /// Creates a new spawner using the current runtime handle.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a tokio runtime.
    pub fn new() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl Default for CurrentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawner for CurrentRuntime {
    fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_spawns_and_joins() {
        let handle = tokio::runtime::Handle::current();
        let join = handle.spawn(async { 42 });
        assert_eq!(join.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn current_runtime_spawns_and_joins() {
        let spawner = CurrentRuntime::new();
        let join = spawner.spawn(async { 42 });
        assert_eq!(join.await.unwrap(), 42);
    }
}
