//! Task executor: the per-request pipeline that ties the gate, the cache,
//! the retry engine and the token refresh coordinator together.
//!
//! [`TaskExecutor::execute`] is the single entry point: gate → cache read →
//! authenticated retry loop → cache write, with the gate's in-flight slot
//! released on every exit path.
//!
//! # Example
//!
//! ```rust,no_run
//! use netreq_executor::{CurrentRuntime, TaskExecutor};
//! use netreq_gate::ControlGate;
//! use netreq_cache::CacheStore;
//! use netreq_refresh::TokenRefreshCoordinator;
//! use netreq_types::{RequestSpec, TaskConfig};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     engine: Arc<dyn netreq_types::Engine>,
//! #     token_store: Arc<dyn netreq_types::TokenStore>,
//! # ) -> Result<(), netreq_core::NetError> {
//! let executor = TaskExecutor::builder(engine, token_store, CurrentRuntime::new())
//!     .gate(Arc::new(ControlGate::new()))
//!     .cache(Arc::new(CacheStore::builder().build()))
//!     .refresh_coordinator(Arc::new(TokenRefreshCoordinator::new()))
//!     .build();
//!
//! let request = RequestSpec::new("GET", "https://api.example.com", "/v1/users");
//! let _bytes = executor.execute(request, TaskConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

mod events;
mod executor;

pub use events::ExecutorEvent;
pub use executor::{CurrentRuntime, Spawner};

use bytes::Bytes;
use hashbrown::HashMap;
use netreq_cache::CacheStore;
use netreq_cachekey::{CacheKey, QueryMap, QueryValue};
use netreq_core::{EventListener, EventListeners, NetError};
use netreq_gate::{ControlGate, GateOutcome};
use netreq_refresh::TokenRefreshCoordinator;
use netreq_retry::RetryDecision;
use netreq_types::{CachePolicy, Engine, Lifecycle, RawRequest, RequestSpec, TaskConfig, TokenRefresher, TokenStore};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Builder for [`TaskExecutor`], matching the rest of the crate's
/// `XConfigBuilder` construction idiom.
pub struct TaskExecutorBuilder<S: Spawner> {
    engine: Arc<dyn Engine>,
    token_store: Arc<dyn TokenStore>,
    token_refresher: Option<Arc<dyn TokenRefresher>>,
    gate: Arc<ControlGate>,
    cache: Arc<CacheStore>,
    refresh_coordinator: Arc<TokenRefreshCoordinator>,
    spawner: S,
    event_listeners: EventListeners<ExecutorEvent>,
}

impl<S: Spawner> TaskExecutorBuilder<S> {
    fn new(engine: Arc<dyn Engine>, token_store: Arc<dyn TokenStore>, spawner: S) -> Self {
        Self {
            engine,
            token_store,
            token_refresher: None,
            gate: Arc::new(ControlGate::new()),
            cache: Arc::new(CacheStore::builder().build()),
            refresh_coordinator: Arc::new(TokenRefreshCoordinator::new()),
            spawner,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the token refresher used on HTTP 401. Without one, a 401
    /// response always surfaces as `NetError::AuthenticationFailed`.
    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.token_refresher = Some(refresher);
        self
    }

    /// Overrides the default, freshly constructed gate with a shared one.
    pub fn gate(mut self, gate: Arc<ControlGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Overrides the default, freshly constructed cache with a shared one.
    /// The cache's own TTL should be left unset (`None`): per-task
    /// freshness for `CachePolicy::CacheFirst` is tracked separately by the
    /// executor, since a single shared store may serve tasks with
    /// different `maxAge`s.
    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    /// Overrides the default, freshly constructed refresh coordinator with
    /// a shared one.
    pub fn refresh_coordinator(mut self, coordinator: Arc<TokenRefreshCoordinator>) -> Self {
        self.refresh_coordinator = coordinator;
        self
    }

    /// Registers a listener for executor events.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<ExecutorEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    pub fn build(self) -> TaskExecutor<S> {
        TaskExecutor {
            engine: self.engine,
            token_store: self.token_store,
            token_refresher: self.token_refresher,
            gate: self.gate,
            cache: self.cache,
            refresh_coordinator: self.refresh_coordinator,
            cache_timestamps: Arc::new(Mutex::new(HashMap::new())),
            spawner: self.spawner,
            event_listeners: self.event_listeners,
        }
    }
}

/// Runs the gate → cache → retry → cache-write pipeline for one
/// `(RequestSpec, TaskConfig)` pair.
///
/// Holds only shared, internally-serialized collaborators (`Arc<ControlGate>`,
/// `Arc<CacheStore>`, `Arc<TokenRefreshCoordinator>`) — there is no
/// process-wide singleton; each owner (typically one `NetworkClient`)
/// constructs its own `TaskExecutor`.
pub struct TaskExecutor<S: Spawner> {
    engine: Arc<dyn Engine>,
    token_store: Arc<dyn TokenStore>,
    token_refresher: Option<Arc<dyn TokenRefresher>>,
    gate: Arc<ControlGate>,
    cache: Arc<CacheStore>,
    refresh_coordinator: Arc<TokenRefreshCoordinator>,
    /// Sidecar recording when each key was last written, so a single shared
    /// `CacheStore` (built with no store-level TTL) can still serve
    /// per-task `CacheFirst(maxAge)` freshness checks.
    cache_timestamps: Arc<Mutex<HashMap<CacheKey, Instant>>>,
    spawner: S,
    event_listeners: EventListeners<ExecutorEvent>,
}

impl<S: Spawner> TaskExecutor<S> {
    /// Starts building a new executor around the given engine, token store
    /// and spawner.
    pub fn builder(engine: Arc<dyn Engine>, token_store: Arc<dyn TokenStore>, spawner: S) -> TaskExecutorBuilder<S> {
        TaskExecutorBuilder::new(engine, token_store, spawner)
    }

    /// Runs the full pipeline for one request.
    pub async fn execute(&self, request: RequestSpec, config: TaskConfig) -> Result<Bytes, NetError> {
        let cancel_token = match &config.lifecycle {
            Lifecycle::BoundToOwner(token) => Some(token.clone()),
            Lifecycle::Persistent | Lifecycle::Manual => None,
        };
        check_cancelled(&cancel_token)?;

        let key = cache_key_for(&request);
        let key_str = key.as_hex();
        let dedup = config.control.deduplicate;

        match self
            .gate
            .pass(&key_str, &config.control.to_gate_policy(), cancel_token.as_ref())
            .await
        {
            GateOutcome::Join(mut receiver) => {
                return tokio::select! {
                    result = receiver.recv() => match result {
                        Ok(Ok(bytes)) => Ok(bytes),
                        Ok(Err(shared_err)) => Err(clone_into_owned(&shared_err)),
                        Err(_closed) => Err(NetError::Cancelled),
                    },
                    _ = cancelled(&cancel_token) => Err(NetError::Cancelled),
                };
            }
            GateOutcome::Cancelled => return Err(NetError::Cancelled),
            GateOutcome::Proceed => {}
        }

        check_cancelled(&cancel_token)?;
        let result = self.execute_past_gate(&request, &config, key, &cancel_token).await;

        if dedup {
            match &result {
                Ok(bytes) => self.gate.complete(&key_str, Ok(bytes.clone())),
                Err(err) if err.is_cancelled() => self.gate.cancel(&key_str),
                Err(err) => self
                    .gate
                    .complete(&key_str, Err(Arc::new(clone_into_owned(err)))),
            }
        }

        result
    }

    async fn execute_past_gate(
        &self,
        request: &RequestSpec,
        config: &TaskConfig,
        key: CacheKey,
        cancel_token: &Option<CancellationToken>,
    ) -> Result<Bytes, NetError> {
        match &config.cache {
            CachePolicy::None => {}
            CachePolicy::CacheFirst(max_age) => {
                if let Some(bytes) = self.fresh_read(&key, *max_age) {
                    return Ok(bytes);
                }
            }
            CachePolicy::StaleWhileRevalidate => {
                if let Some(bytes) = self.cache.read(&key) {
                    self.spawn_background_refresh(key, request.clone(), config.clone());
                    return Ok(bytes);
                }
            }
        }

        check_cancelled(cancel_token)?;
        let key_str = key.as_hex();
        let bytes = run_with_retries(
            self.engine.as_ref(),
            self.token_store.as_ref(),
            self.token_refresher.as_deref(),
            self.refresh_coordinator.as_ref(),
            request,
            config,
            cancel_token,
            &self.event_listeners,
            &key_str,
        )
        .await?;

        match &config.cache {
            CachePolicy::None => {}
            CachePolicy::CacheFirst(max_age) => self.write_cache(key, bytes.clone(), Some(*max_age)),
            CachePolicy::StaleWhileRevalidate => self.write_cache(key, bytes.clone(), None),
        }

        Ok(bytes)
    }

    fn fresh_read(&self, key: &CacheKey, max_age: Duration) -> Option<Bytes> {
        let bytes = self.cache.read(key)?;
        let fresh = self
            .cache_timestamps
            .lock()
            .get(key)
            .is_some_and(|stored_at| stored_at.elapsed() <= max_age);
        fresh.then_some(bytes)
    }

    fn write_cache(&self, key: CacheKey, bytes: Bytes, ttl: Option<Duration>) {
        self.cache.write(key, bytes, ttl);
        self.cache_timestamps.lock().insert(key, Instant::now());
    }

    /// Runs steps 4-5 (authenticated retry loop, cache write) in the
    /// background for `StaleWhileRevalidate`, without holding the gate's
    /// in-flight slot — the caller already got its (possibly stale)
    /// answer. Failures are logged via an event, never raised.
    fn spawn_background_refresh(&self, key: CacheKey, request: RequestSpec, config: TaskConfig) {
        let engine = Arc::clone(&self.engine);
        let token_store = Arc::clone(&self.token_store);
        let token_refresher = self.token_refresher.clone();
        let refresh_coordinator = Arc::clone(&self.refresh_coordinator);
        let cache = Arc::clone(&self.cache);
        let cache_timestamps = Arc::clone(&self.cache_timestamps);
        let event_listeners = self.event_listeners.clone();
        let key_str = key.as_hex();

        self.spawner.spawn(async move {
            let result = run_with_retries(
                engine.as_ref(),
                token_store.as_ref(),
                token_refresher.as_deref(),
                refresh_coordinator.as_ref(),
                &request,
                &config,
                &None,
                &event_listeners,
                &key_str,
            )
            .await;

            match result {
                Ok(bytes) => {
                    cache.write(key, bytes, None);
                    cache_timestamps.lock().insert(key, Instant::now());
                }
                Err(_) => {
                    event_listeners.emit(&ExecutorEvent::BackgroundRefreshFailed {
                        key: key_str,
                        timestamp: Instant::now(),
                    });
                }
            }
        });
    }
}

fn cache_key_for(request: &RequestSpec) -> CacheKey {
    netreq_cachekey::derive(
        &request.method,
        &request.base_url,
        &request.path,
        Some(&request.query),
        request.body_spec().as_ref(),
    )
}

fn check_cancelled(token: &Option<CancellationToken>) -> Result<(), NetError> {
    if token.as_ref().is_some_and(|t| t.is_cancelled()) {
        Err(NetError::Cancelled)
    } else {
        Ok(())
    }
}

async fn cancelled(token: &Option<CancellationToken>) {
    match token {
        Some(t) => t.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Converts the shared, `Arc`-wrapped error a gate follower observes back
/// into an owned `NetError`. `NetError` can't derive `Clone` itself (its
/// `Unknown` variant boxes a trait object), so followers reconstruct an
/// equivalent value field-by-field instead of sharing the original.
fn clone_into_owned(err: &NetError) -> NetError {
    match err {
        NetError::Cancelled => NetError::Cancelled,
        NetError::Timeout(d) => NetError::Timeout(*d),
        NetError::NoNetwork => NetError::NoNetwork,
        NetError::ServerError { code, message } => NetError::ServerError {
            code: *code,
            message: message.clone(),
        },
        NetError::DecodingFailed(s) => NetError::DecodingFailed(s.clone()),
        NetError::AuthenticationFailed(s) => NetError::AuthenticationFailed(s.clone()),
        NetError::RetryExhausted(inner) => NetError::RetryExhausted(Box::new(clone_into_owned(inner))),
        NetError::InvalidUrl(s) => NetError::InvalidUrl(s.clone()),
        NetError::Unknown(e) => NetError::Unknown(Box::new(std::io::Error::other(e.to_string()))),
    }
}

/// The authenticated retry loop: re-applies auth on every attempt, calls
/// the engine, classifies the outcome, and handles a single token refresh
/// on 401 per task lifetime. Free-standing (not a method) so it can run
/// identically from `execute`'s own call and from a spawned
/// stale-while-revalidate background task that no longer borrows `self`.
#[allow(clippy::too_many_arguments)]
async fn run_with_retries(
    engine: &dyn Engine,
    token_store: &dyn TokenStore,
    token_refresher: Option<&dyn TokenRefresher>,
    refresh_coordinator: &TokenRefreshCoordinator,
    request: &RequestSpec,
    config: &TaskConfig,
    cancel_token: &Option<CancellationToken>,
    event_listeners: &EventListeners<ExecutorEvent>,
    key_str: &str,
) -> Result<Bytes, NetError> {
    let idempotent = request.is_idempotent(None);

    let attempts = async {
        let mut attempt = 0usize;
        let mut refreshed = false;

        loop {
            check_cancelled(cancel_token)?;
            event_listeners.emit(&ExecutorEvent::Attempt {
                key: key_str.to_string(),
                attempt,
                timestamp: Instant::now(),
            });

            let raw = build_raw_request(request, token_store).await;
            let call = engine.send_once(raw);
            let timed = async {
                match config.timeout {
                    Some(t) => tokio::time::timeout(t, call)
                        .await
                        .unwrap_or(Err(NetError::Timeout(t))),
                    None => call.await,
                }
            };
            let response = tokio::select! {
                response = timed => response,
                _ = cancelled(cancel_token) => Err(NetError::Cancelled),
            };

            let raw_response = match response {
                Ok(raw_response) => raw_response,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    match netreq_retry::classify(&config.retry, &err, idempotent, attempt) {
                        RetryDecision::Retry(delay) => {
                            sleep_or_cancel(delay, attempt, key_str, event_listeners, cancel_token).await?;
                            attempt += 1;
                            continue;
                        }
                        RetryDecision::GiveUp => {
                            emit_failed(key_str, event_listeners);
                            return Err(err);
                        }
                        RetryDecision::Exhausted => {
                            emit_failed(key_str, event_listeners);
                            return Err(NetError::RetryExhausted(Box::new(err)));
                        }
                    }
                }
            };

            if (200..300).contains(&raw_response.status) {
                event_listeners.emit(&ExecutorEvent::Succeeded {
                    key: key_str.to_string(),
                    timestamp: Instant::now(),
                });
                return Ok(raw_response.body);
            }

            if raw_response.status == 401 && !refreshed {
                if let Some(refresher) = token_refresher {
                    refreshed = true;
                    tokio::select! {
                        result = refresh_coordinator.refresh(refresher) => result?,
                        _ = cancelled(cancel_token) => return Err(NetError::Cancelled),
                    };
                    attempt += 1;
                    continue;
                }
                emit_failed(key_str, event_listeners);
                return Err(NetError::AuthenticationFailed(
                    "received 401 with no token refresher configured".to_string(),
                ));
            }

            let err = NetError::ServerError {
                code: raw_response.status,
                message: None,
            };
            if !err.is_retryable() {
                emit_failed(key_str, event_listeners);
                return Err(err);
            }
            match netreq_retry::classify(&config.retry, &err, idempotent, attempt) {
                RetryDecision::Retry(delay) => {
                    sleep_or_cancel(delay, attempt, key_str, event_listeners, cancel_token).await?;
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    emit_failed(key_str, event_listeners);
                    return Err(err);
                }
                RetryDecision::Exhausted => {
                    emit_failed(key_str, event_listeners);
                    return Err(NetError::RetryExhausted(Box::new(err)));
                }
            }
        }
    };

    match config.total_timeout {
        Some(total) => tokio::time::timeout(total, attempts)
            .await
            .unwrap_or(Err(NetError::Timeout(total))),
        None => attempts.await,
    }
}

async fn sleep_or_cancel(
    delay: Duration,
    attempt: usize,
    key_str: &str,
    event_listeners: &EventListeners<ExecutorEvent>,
    cancel_token: &Option<CancellationToken>,
) -> Result<(), NetError> {
    event_listeners.emit(&ExecutorEvent::Retrying {
        key: key_str.to_string(),
        attempt,
        delay,
        timestamp: Instant::now(),
    });
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancelled(cancel_token) => Err(NetError::Cancelled),
    }
}

fn emit_failed(key_str: &str, event_listeners: &EventListeners<ExecutorEvent>) {
    event_listeners.emit(&ExecutorEvent::Failed {
        key: key_str.to_string(),
        timestamp: Instant::now(),
    });
}

async fn build_raw_request(request: &RequestSpec, token_store: &dyn TokenStore) -> RawRequest {
    let mut headers = request.headers.clone();
    if let Some(auth) = &request.auth {
        if auth.strategy.eq_ignore_ascii_case("bearer") {
            if let Some(token) = token_store.get().await {
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            }
        }
    }

    RawRequest {
        method: request.method.clone(),
        url: build_url(&request.base_url, &request.path, &request.query),
        headers,
        body: request.body.clone(),
    }
}

fn build_url(base_url: &str, path: &str, query: &QueryMap) -> String {
    let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);
    if !query.is_empty() {
        url.push('?');
        let mut first = true;
        for (key, value) in query {
            if !first {
                url.push('&');
            }
            first = false;
            write_query_pair(&mut url, key, value);
        }
    }
    url
}

fn write_query_pair(url: &mut String, key: &str, value: &QueryValue) {
    match value {
        QueryValue::Scalar(s) => {
            url.push_str(&percent_encode(key));
            url.push('=');
            url.push_str(&percent_encode(s));
        }
        QueryValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    url.push('&');
                }
                write_query_pair(url, key, item);
            }
        }
        QueryValue::Map(map) => {
            let mut first = true;
            for (sub_key, sub_value) in map {
                if !first {
                    url.push('&');
                }
                first = false;
                write_query_pair(url, &format!("{key}.{sub_key}"), sub_value);
            }
        }
    }
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use netreq_types::{RawResponse, RetryPolicy};
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedEngine {
        responses: Mutex<Vec<Result<RawResponse, NetError>>>,
        calls: AtomicUsize,
        last_auth_header: Mutex<Option<String>>,
    }

    impl ScriptedEngine {
        fn new(responses: Vec<Result<RawResponse, NetError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                last_auth_header: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl Engine for ScriptedEngine {
        async fn send_once(&self, request: RawRequest) -> Result<RawResponse, NetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let auth = request
                .headers
                .iter()
                .find(|(k, _)| k == "Authorization")
                .map(|(_, v)| v.clone());
            *self.last_auth_header.lock() = auth;

            let mut responses = self.responses.lock();
            if responses.is_empty() {
                panic!("engine called more times than scripted");
            }
            responses.remove(0)
        }
    }

    struct StaticTokenStore(Mutex<String>);

    #[async_trait::async_trait]
    impl TokenStore for StaticTokenStore {
        async fn get(&self) -> Option<String> {
            Some(self.0.lock().clone())
        }
    }

    struct OneShotRefresher {
        calls: AtomicUsize,
        new_token: String,
        store: Arc<StaticTokenStore>,
    }

    #[async_trait::async_trait]
    impl TokenRefresher for OneShotRefresher {
        async fn refresh(&self) -> Result<String, NetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.store.0.lock() = self.new_token.clone();
            Ok(self.new_token.clone())
        }
    }

    fn ok_response(body: &str) -> Result<RawResponse, NetError> {
        Ok(RawResponse {
            status: 200,
            headers: StdHashMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        })
    }

    fn status_response(status: u16) -> Result<RawResponse, NetError> {
        Ok(RawResponse {
            status,
            headers: StdHashMap::new(),
            body: Bytes::new(),
        })
    }

    fn executor_with(
        engine: Arc<ScriptedEngine>,
        token_store: Arc<StaticTokenStore>,
        refresher: Option<Arc<dyn TokenRefresher>>,
    ) -> TaskExecutor<CurrentRuntime> {
        let mut builder = TaskExecutor::builder(engine, token_store, CurrentRuntime::new());
        if let Some(r) = refresher {
            builder = builder.token_refresher(r);
        }
        builder.build()
    }

    #[tokio::test]
    async fn successful_response_returns_body() {
        let engine = Arc::new(ScriptedEngine::new(vec![ok_response(r#"{"id":1}"#)]));
        let token_store = Arc::new(StaticTokenStore(Mutex::new("t".into())));
        let executor = executor_with(engine, token_store, None);

        let request = RequestSpec::new("GET", "https://api.example.com", "/v1/users");
        let bytes = executor.execute(request, TaskConfig::default()).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(br#"{"id":1}"#));
    }

    #[tokio::test]
    async fn concurrent_dedup_calls_the_engine_once() {
        let engine = Arc::new(ScriptedEngine::new(vec![ok_response(r#"{"id":1}"#)]));
        let token_store = Arc::new(StaticTokenStore(Mutex::new("t".into())));
        let executor = Arc::new(executor_with(Arc::clone(&engine), token_store, None));

        let mut config = TaskConfig::default();
        config.control.deduplicate = true;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let executor = Arc::clone(&executor);
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                let request = RequestSpec::new("GET", "https://api.example.com", "/v1/users?page=1");
                executor.execute(request, config).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Bytes::from_static(br#"{"id":1}"#));
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unauthorized_then_refresh_then_success() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            status_response(401),
            ok_response(r#"{"ok":true}"#),
        ]));
        let token_store = Arc::new(StaticTokenStore(Mutex::new("old-token".into())));
        let refresher = Arc::new(OneShotRefresher {
            calls: AtomicUsize::new(0),
            new_token: "new-token".into(),
            store: Arc::clone(&token_store),
        });

        let executor = executor_with(Arc::clone(&engine), Arc::clone(&token_store), Some(refresher.clone()));

        let mut request = RequestSpec::new("GET", "https://api.example.com", "/v1/secret");
        request.auth = Some(netreq_types::AuthBinding {
            strategy: "bearer".into(),
            context: "primary".into(),
        });

        let mut config = TaskConfig::default();
        config.retry = RetryPolicy::Fixed {
            delay: Duration::ZERO,
            max_attempts: 3,
        };

        let bytes = executor.execute(request, config).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(br#"{"ok":true}"#));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            engine.last_auth_header.lock().clone(),
            Some("Bearer new-token".to_string())
        );
    }

    #[tokio::test]
    async fn non_idempotent_post_never_retries_on_500() {
        let engine = Arc::new(ScriptedEngine::new(vec![status_response(500)]));
        let token_store = Arc::new(StaticTokenStore(Mutex::new("t".into())));
        let executor = executor_with(Arc::clone(&engine), token_store, None);

        let request = RequestSpec::new("POST", "https://api.example.com", "/orders");
        let mut config = TaskConfig::default();
        config.retry = RetryPolicy::Fixed {
            delay: Duration::ZERO,
            max_attempts: 5,
        };

        let err = executor.execute(request, config).await.unwrap_err();
        assert!(matches!(err, NetError::ServerError { code: 500, .. }));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_first_hit_within_max_age_skips_the_engine() {
        let engine = Arc::new(ScriptedEngine::new(vec![ok_response(r#"{"v":1}"#)]));
        let token_store = Arc::new(StaticTokenStore(Mutex::new("t".into())));
        let executor = executor_with(Arc::clone(&engine), token_store, None);

        let request = RequestSpec::new("GET", "https://api.example.com", "/v1/cached");
        let mut config = TaskConfig::default();
        config.cache = CachePolicy::CacheFirst(Duration::from_secs(60));

        let first = executor.execute(request.clone(), config.clone()).await.unwrap();
        let second = executor.execute(request, config).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_while_revalidate_returns_cached_value_immediately() {
        let engine = Arc::new(ScriptedEngine::new(vec![ok_response(r#"{"v":2}"#)]));
        let token_store = Arc::new(StaticTokenStore(Mutex::new("t".into())));
        let executor = executor_with(Arc::clone(&engine), token_store, None);

        let request = RequestSpec::new("GET", "https://api.example.com", "/v1/swr");
        let key = cache_key_for(&request);
        executor.cache.write(key, Bytes::from_static(br#"{"v":1}"#), None);
        executor.cache_timestamps.lock().insert(key, Instant::now());

        let mut config = TaskConfig::default();
        config.cache = CachePolicy::StaleWhileRevalidate;

        let bytes = executor.execute(request, config).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(br#"{"v":1}"#));
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits_before_any_call() {
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        let token_store = Arc::new(StaticTokenStore(Mutex::new("t".into())));
        let executor = executor_with(Arc::clone(&engine), token_store, None);

        let token = CancellationToken::new();
        token.cancel();

        let request = RequestSpec::new("GET", "https://api.example.com", "/v1/x");
        let mut config = TaskConfig::default();
        config.lifecycle = Lifecycle::BoundToOwner(token);

        let err = executor.execute(request, config).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    struct HangingEngine {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Engine for HangingEngine {
        async fn send_once(&self, _request: RawRequest) -> Result<RawResponse, NetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancelling_the_token_aborts_an_in_flight_engine_call() {
        let engine = Arc::new(HangingEngine { calls: AtomicUsize::new(0) });
        let token_store = Arc::new(StaticTokenStore(Mutex::new("t".into())));
        let executor = executor_with(Arc::clone(&engine), token_store, None);

        let token = CancellationToken::new();
        let request = RequestSpec::new("GET", "https://api.example.com", "/v1/slow");
        let mut config = TaskConfig::default();
        config.lifecycle = Lifecycle::BoundToOwner(token.clone());

        let handle = tokio::spawn(async move { executor.execute(request, config).await });
        tokio::task::yield_now().await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

        token.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }
}
