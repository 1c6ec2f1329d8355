//! `netreq`: a client-side network request execution engine.
//!
//! [`NetworkClient`] is the single entry point: construct one per backend
//! connection (there is no process-wide singleton, mirroring the rest of
//! this workspace's crates) and call [`NetworkClient::execute`] for a single
//! request or [`NetworkClient::orchestrate`] for a DAG of them. Internally
//! it wires together the cache ([`netreq_cache`]), the control gate
//! ([`netreq_gate`]), the token refresh coordinator ([`netreq_refresh`]) and
//! the retry engine ([`netreq_retry`]) behind one [`TaskExecutor`].
//!
//! # Example
//!
//! ```rust,no_run
//! use netreq::{CurrentRuntime, Engine, NetworkClient, RequestSpec, TaskConfig, TokenStore};
//! use std::sync::Arc;
//!
//! # async fn example(engine: Arc<dyn Engine>, token_store: Arc<dyn TokenStore>) -> Result<(), netreq::NetError> {
//! let client: NetworkClient<CurrentRuntime> = NetworkClient::builder(engine, token_store).build();
//!
//! let request = RequestSpec::new("GET", "https://api.example.com", "/v1/users");
//! let _body = client.execute(request, TaskConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub use netreq_cache::CacheStore;
pub use netreq_cachekey::CacheKey;
pub use netreq_core::{EventListener, EventListeners, NetError, ResilienceEvent};
pub use netreq_executor::{CurrentRuntime, ExecutorEvent, Spawner, TaskExecutor, TaskExecutorBuilder};
pub use netreq_gate::{ControlGate, GateEvent};
pub use netreq_refresh::TokenRefreshCoordinator;
pub use netreq_retry::{classify, is_idempotent_method, RetryDecision, RetryPolicy};
pub use netreq_types::{
    AuthBinding, CachePolicy, ControlPolicy, Engine, Lifecycle, Priority, RawRequest, RawResponse, RequestSpec,
    TaskConfig, TaskConfigBuilder, TokenRefresher, TokenStore,
};

#[cfg(feature = "orchestrator")]
pub use netreq_orchestrator::{
    orchestrate, orchestrate_with_listeners, CancellationStrategy, ExtractionError, FailureStrategy,
    OrchestrationNode, OrchestrationPlan, OrchestratorError, OrchestratorEvent, ResultMap,
};

use bytes::Bytes;
use std::sync::Arc;

/// The client-facing entry point for running requests against one backend.
///
/// Holds its own `CacheStore`, `ControlGate` and `TokenRefreshCoordinator`
/// (unless overridden with shared ones via the builder); cloning a client
/// isn't supported because nothing here needs to be shared beyond one
/// `Arc` around a `NetworkClient` itself.
pub struct NetworkClient<S: Spawner = CurrentRuntime> {
    executor: TaskExecutor<S>,
}

impl NetworkClient<CurrentRuntime> {
    /// Starts building a client whose background work (e.g. a
    /// `StaleWhileRevalidate` refresh) is spawned onto the calling task's
    /// current tokio runtime.
    pub fn builder(engine: Arc<dyn Engine>, token_store: Arc<dyn TokenStore>) -> NetworkClientBuilder<CurrentRuntime> {
        NetworkClientBuilder::new(engine, token_store, CurrentRuntime::new())
    }
}

impl<S: Spawner> NetworkClient<S> {
    /// Starts building a client around an explicit [`Spawner`], for callers
    /// who want background work to land on a runtime other than the
    /// current one.
    pub fn builder_with_spawner(
        engine: Arc<dyn Engine>,
        token_store: Arc<dyn TokenStore>,
        spawner: S,
    ) -> NetworkClientBuilder<S> {
        NetworkClientBuilder::new(engine, token_store, spawner)
    }

    /// Runs the gate → cache → authenticated retry → cache-write pipeline
    /// for one request.
    pub async fn execute(&self, request: RequestSpec, config: TaskConfig) -> Result<Bytes, NetError> {
        self.executor.execute(request, config).await
    }

    /// Runs a DAG of requests through this client's executor, in
    /// topologically sorted, concurrently-executed layers.
    #[cfg(feature = "orchestrator")]
    pub async fn orchestrate<Id, T>(
        &self,
        plan: OrchestrationPlan<Id, T>,
        failure_strategy: FailureStrategy,
        cancellation_strategy: CancellationStrategy,
    ) -> Result<T, OrchestratorError<Id>>
    where
        Id: Clone + Eq + std::hash::Hash + Ord + std::fmt::Debug + Send + Sync + 'static,
    {
        netreq_orchestrator::orchestrate(plan, &self.executor, failure_strategy, cancellation_strategy).await
    }

    /// Direct access to the underlying executor, for registering
    /// additional event listeners or building an orchestrator plan against
    /// it without going through the client wrapper.
    pub fn executor(&self) -> &TaskExecutor<S> {
        &self.executor
    }
}

/// Builder for [`NetworkClient`], forwarding to the underlying
/// [`TaskExecutorBuilder`].
pub struct NetworkClientBuilder<S: Spawner> {
    inner: TaskExecutorBuilder<S>,
}

impl<S: Spawner> NetworkClientBuilder<S> {
    fn new(engine: Arc<dyn Engine>, token_store: Arc<dyn TokenStore>, spawner: S) -> Self {
        Self {
            inner: TaskExecutor::builder(engine, token_store, spawner),
        }
    }

    /// Sets the token refresher used on HTTP 401. Without one, a 401 always
    /// surfaces as `NetError::AuthenticationFailed`.
    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.inner = self.inner.token_refresher(refresher);
        self
    }

    /// Shares an externally constructed gate instead of a fresh one.
    pub fn gate(mut self, gate: Arc<ControlGate>) -> Self {
        self.inner = self.inner.gate(gate);
        self
    }

    /// Shares an externally constructed cache instead of a fresh one. Leave
    /// its TTL unset — per-task `CacheFirst(maxAge)` freshness is tracked by
    /// the executor, not the store.
    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.inner = self.inner.cache(cache);
        self
    }

    /// Shares an externally constructed refresh coordinator instead of a
    /// fresh one.
    pub fn refresh_coordinator(mut self, coordinator: Arc<TokenRefreshCoordinator>) -> Self {
        self.inner = self.inner.refresh_coordinator(coordinator);
        self
    }

    /// Registers a listener for executor events (gate/cache/retry/refresh
    /// decisions surfaced at the pipeline level).
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<ExecutorEvent> + 'static,
    {
        self.inner = self.inner.add_listener(listener);
        self
    }

    pub fn build(self) -> NetworkClient<S> {
        NetworkClient {
            executor: self.inner.build(),
        }
    }
}
