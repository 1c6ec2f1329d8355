//! DAG orchestration on top of [`netreq_executor::TaskExecutor`].
//!
//! [`orchestrate`] takes a set of nodes with id-based dependencies, groups
//! them into topological layers (Kahn's algorithm), and runs each layer
//! concurrently through a shared `TaskExecutor`, with a strict barrier
//! between layers: nothing in layer *n+1* starts until every node in layer
//! *n* has reached a terminal state.
//!
//! # Example
//!
//! ```rust,no_run
//! use netreq_executor::{CurrentRuntime, TaskExecutor};
//! use netreq_orchestrator::{orchestrate, CancellationStrategy, FailureStrategy, OrchestrationNode, OrchestrationPlan};
//! use netreq_types::{RequestSpec, TaskConfig};
//!
//! # async fn example(executor: TaskExecutor<CurrentRuntime>) -> Result<(), Box<dyn std::error::Error>> {
//! let nodes = vec![
//!     OrchestrationNode::new("user", RequestSpec::new("GET", "https://api.example.com", "/user"), TaskConfig::default()),
//!     OrchestrationNode::new("orders", RequestSpec::new("GET", "https://api.example.com", "/orders"), TaskConfig::default())
//!         .after("user"),
//! ];
//! let plan = OrchestrationPlan::new(nodes, |results| {
//!     netreq_orchestrator::require(results, &"orders")
//! });
//!
//! let _orders = orchestrate(plan, &executor, FailureStrategy::FailFast, CancellationStrategy::Isolate).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod events;
mod layers;
mod node;

pub use error::OrchestratorError;
pub use events::OrchestratorEvent;
pub use node::{require, ExtractionError, OrchestrationNode, OrchestrationPlan, ResultMap};

use hashbrown::{HashMap, HashSet};
use layers::compute_layers;
use netreq_core::{EventListener, EventListeners};
use netreq_executor::{Spawner, TaskExecutor};
use netreq_types::{Lifecycle, TaskConfig};
use std::fmt;
use std::hash::Hash;
use std::time::Instant;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

/// How a layer handles a node failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStrategy {
    /// Abort the layer on the first error; other in-flight nodes in that
    /// layer are dropped (cancelled) and the error is raised immediately.
    FailFast,
    /// Skip any node whose dependency chain includes a failed id, but keep
    /// running the rest of the layer. A layer with runnable nodes that all
    /// fail raises an aggregated error.
    ContinueOnError,
}

/// How a node's own cancellation propagates to its not-yet-started
/// descendants, under [`FailureStrategy::ContinueOnError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationStrategy {
    /// A node that is itself cancelled (`NetError::Cancelled`) proactively
    /// cancels the `CancellationToken` of every descendant still pending,
    /// and those descendants are recorded as cancelled rather than merely
    /// skipped.
    Cascading,
    /// A cancelled node's descendants are skipped through the normal
    /// dependency-failed path only; their own tokens are left alone.
    Isolate,
}

/// Runs every node in `plan` to completion (or to its first fatal error
/// under `FailFast`), then calls the plan's `transform`.
pub async fn orchestrate<Id, T, S>(
    plan: OrchestrationPlan<Id, T>,
    executor: &TaskExecutor<S>,
    failure_strategy: FailureStrategy,
    cancellation_strategy: CancellationStrategy,
) -> Result<T, OrchestratorError<Id>>
where
    Id: Clone + Eq + Hash + Ord + fmt::Debug + Send + Sync + 'static,
    S: Spawner,
{
    orchestrate_with_listeners(plan, executor, failure_strategy, cancellation_strategy, &EventListeners::new()).await
}

/// As [`orchestrate`], but emits [`OrchestratorEvent`]s to `event_listeners`
/// as each layer and node completes.
pub async fn orchestrate_with_listeners<Id, T, S>(
    plan: OrchestrationPlan<Id, T>,
    executor: &TaskExecutor<S>,
    failure_strategy: FailureStrategy,
    cancellation_strategy: CancellationStrategy,
    event_listeners: &EventListeners<OrchestratorEvent>,
) -> Result<T, OrchestratorError<Id>>
where
    Id: Clone + Eq + Hash + Ord + fmt::Debug + Send + Sync + 'static,
    S: Spawner,
{
    let node::OrchestrationPlan { nodes, transform } = plan;
    let layers = compute_layers(&nodes)?;
    let reverse_deps = build_reverse_deps(&nodes);
    let by_id: HashMap<Id, &OrchestrationNode<Id>> = nodes.iter().map(|n| (n.id.clone(), n)).collect();

    let mut results: ResultMap<Id> = HashMap::new();
    // id -> was the upstream failure a cancellation (vs. an ordinary error)
    let mut failed: HashMap<Id, bool> = HashMap::new();

    for (layer_index, layer) in layers.into_iter().enumerate() {
        event_listeners.emit(&OrchestratorEvent::LayerStarted {
            layer: layer_index,
            node_count: layer.len(),
            timestamp: Instant::now(),
        });

        let mut runnable: Vec<&OrchestrationNode<Id>> = Vec::new();
        for id in &layer {
            let this_node = by_id[id];
            match skip_reason(&this_node.deps, &failed) {
                Some(cancelled) => {
                    failed.insert(id.clone(), cancelled);
                    let err = if cancelled {
                        netreq_core::NetError::Cancelled
                    } else {
                        dependency_failed_error()
                    };
                    event_listeners.emit(&OrchestratorEvent::NodeSkipped {
                        node: format!("{id:?}"),
                        timestamp: Instant::now(),
                    });
                    results.insert(id.clone(), Err(err));
                }
                None => runnable.push(this_node),
            }
        }

        if runnable.is_empty() {
            continue;
        }

        let mut in_flight: FuturesUnordered<_> = runnable
            .iter()
            .map(|node| {
                let id = node.id.clone();
                let request = node.request.clone();
                let config = node.config.clone();
                async move {
                    let result = executor.execute(request, config).await;
                    (id, result)
                }
            })
            .collect();

        let mut layer_failed_ids: Vec<Id> = Vec::new();
        let mut layer_successes = 0usize;

        while let Some((id, result)) = in_flight.next().await {
            match result {
                Ok(bytes) => {
                    layer_successes += 1;
                    event_listeners.emit(&OrchestratorEvent::NodeSucceeded {
                        node: format!("{id:?}"),
                        timestamp: Instant::now(),
                    });
                    results.insert(id, Ok(bytes));
                }
                Err(err) => {
                    event_listeners.emit(&OrchestratorEvent::NodeFailed {
                        node: format!("{id:?}"),
                        timestamp: Instant::now(),
                    });

                    if failure_strategy == FailureStrategy::FailFast {
                        // Dropping `in_flight` drops every other future in
                        // this layer, cancelling whatever is still running.
                        drop(in_flight);
                        return Err(OrchestratorError::NodeFailed(id, err));
                    }

                    let was_cancelled = err.is_cancelled();
                    if was_cancelled && cancellation_strategy == CancellationStrategy::Cascading {
                        cascade_cancel(&by_id, &reverse_deps, &id, event_listeners);
                    }
                    failed.insert(id.clone(), was_cancelled);
                    layer_failed_ids.push(id.clone());
                    results.insert(id, Err(err));
                }
            }
        }

        if layer_successes == 0 && !layer_failed_ids.is_empty() {
            let aggregated = layer_failed_ids
                .into_iter()
                .map(|id| {
                    let err = results.remove(&id).expect("just inserted").unwrap_err();
                    (id, err)
                })
                .collect();
            return Err(OrchestratorError::AggregatedFailure(aggregated));
        }
    }

    transform(&results).map_err(OrchestratorError::Extraction)
}

/// Determines whether a node whose `deps` include an already-terminal,
/// failed id should itself be skipped, and if so whether that failure was a
/// cancellation (relevant only to [`CancellationStrategy::Cascading`]).
fn skip_reason<Id: Eq + Hash>(deps: &[Id], failed: &HashMap<Id, bool>) -> Option<bool> {
    deps.iter().find_map(|dep| failed.get(dep).copied())
}

fn dependency_failed_error() -> netreq_core::NetError {
    netreq_core::NetError::Unknown(Box::new(std::io::Error::other("a dependency failed")))
}

fn build_reverse_deps<Id: Clone + Eq + Hash>(nodes: &[OrchestrationNode<Id>]) -> HashMap<Id, Vec<Id>> {
    let mut reverse: HashMap<Id, Vec<Id>> = HashMap::new();
    for node in nodes {
        for dep in &node.deps {
            reverse.entry(dep.clone()).or_default().push(node.id.clone());
        }
    }
    reverse
}

/// Walks every transitive descendant of `start` and cancels its
/// `CancellationToken`, if it has one. Only the direct control-flow effect
/// of descendant *skipping* happens regardless of strategy (a pending node
/// whose dependency already failed is never submitted); this is the extra,
/// strategy-gated effect of actually signalling cancellation to a
/// `Lifecycle::BoundToOwner` node before it would otherwise have started.
fn cascade_cancel<Id: Clone + Eq + Hash + fmt::Debug>(
    by_id: &HashMap<Id, &OrchestrationNode<Id>>,
    reverse_deps: &HashMap<Id, Vec<Id>>,
    start: &Id,
    event_listeners: &EventListeners<OrchestratorEvent>,
) {
    let mut stack: Vec<Id> = reverse_deps.get(start).cloned().unwrap_or_default();
    let mut visited: HashSet<Id> = HashSet::new();

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(node) = by_id.get(&id) {
            if let Lifecycle::BoundToOwner(token) = &node.config.lifecycle {
                token.cancel();
                event_listeners.emit(&OrchestratorEvent::NodeCascadeCancelled {
                    node: format!("{id:?}"),
                    timestamp: Instant::now(),
                });
            }
        }
        if let Some(children) = reverse_deps.get(&id) {
            stack.extend(children.iter().cloned());
        }
    }
}

/// Adds a listener to an externally-owned [`EventListeners<OrchestratorEvent>`];
/// a thin convenience so callers don't need to import [`netreq_core::EventListener`]
/// themselves for the common case.
pub fn add_listener<L>(event_listeners: &mut EventListeners<OrchestratorEvent>, listener: L)
where
    L: EventListener<OrchestratorEvent> + 'static,
{
    event_listeners.add(listener);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use netreq_core::NetError;
    use netreq_executor::CurrentRuntime;
    use netreq_types::{Engine, RawRequest, RawResponse, RequestSpec, TokenStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct ScriptedEngine {
        fail_suffixes: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Engine for ScriptedEngine {
        async fn send_once(&self, request: RawRequest) -> Result<RawResponse, NetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_suffixes.iter().any(|suffix| request.url.ends_with(suffix.as_str())) {
                return Err(NetError::ServerError {
                    code: 500,
                    message: None,
                });
            }
            Ok(RawResponse {
                status: 200,
                headers: Default::default(),
                body: Bytes::from(request.url),
            })
        }
    }

    struct NoAuth;

    #[async_trait]
    impl TokenStore for NoAuth {
        async fn get(&self) -> Option<String> {
            None
        }
    }

    fn executor_with(fail_suffixes: Vec<&str>) -> TaskExecutor<CurrentRuntime> {
        let engine = Arc::new(ScriptedEngine {
            fail_suffixes: fail_suffixes.into_iter().map(String::from).collect(),
            calls: AtomicUsize::new(0),
        });
        TaskExecutor::builder(engine, Arc::new(NoAuth), CurrentRuntime::new()).build()
    }

    fn node(id: &str, deps: &[&str]) -> OrchestrationNode<String> {
        OrchestrationNode::new(
            id.to_string(),
            RequestSpec::new("GET", "https://example.test", format!("/{id}")),
            TaskConfig::default(),
        )
        .depends_on(deps.iter().map(|s| s.to_string()))
    }

    #[tokio::test]
    async fn diamond_dag_all_succeed_and_transform_reads_the_sink_node() {
        let executor = executor_with(vec![]);
        let nodes = vec![node("a", &[]), node("b", &["a"]), node("c", &["a"]), node("d", &["b", "c"])];
        let plan = OrchestrationPlan::new(nodes, |results: &ResultMap<String>| require(results, &"d".to_string()));

        let body = orchestrate(plan, &executor, FailureStrategy::FailFast, CancellationStrategy::Isolate)
            .await
            .unwrap();
        assert_eq!(body, Bytes::from("https://example.test/d"));
    }

    #[tokio::test]
    async fn scenario_fail_fast_aborts_on_first_layer_failure_and_skips_descendant() {
        // A; B.after(A); C.after(A); D.after(B, C). C fails. FailFast.
        let executor = executor_with(vec!["/c"]);
        let nodes = vec![node("a", &[]), node("b", &["a"]), node("c", &["a"]), node("d", &["b", "c"])];
        let plan = OrchestrationPlan::new(nodes, |results: &ResultMap<String>| {
            Ok::<_, ExtractionError<String>>(results.len())
        });

        let err = orchestrate(plan, &executor, FailureStrategy::FailFast, CancellationStrategy::Isolate)
            .await
            .unwrap_err();

        match err {
            OrchestratorError::NodeFailed(id, net_err) => {
                assert_eq!(id, "c");
                assert!(matches!(net_err, NetError::ServerError { code: 500, .. }));
            }
            other => panic!("expected NodeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn continue_on_error_skips_only_the_dependent_branch() {
        let executor = executor_with(vec!["/c"]);
        let nodes = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
            node("e", &["b"]),
        ];
        let plan = OrchestrationPlan::new(nodes, |results: &ResultMap<String>| {
            Ok::<_, ExtractionError<String>>(results.len())
        });

        let count = orchestrate(plan, &executor, FailureStrategy::ContinueOnError, CancellationStrategy::Isolate)
            .await
            .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn a_layer_that_entirely_fails_raises_an_aggregated_error() {
        let executor = executor_with(vec!["/a", "/b"]);
        let nodes = vec![node("a", &[]), node("b", &[])];
        let plan = OrchestrationPlan::new(nodes, |results: &ResultMap<String>| {
            Ok::<_, ExtractionError<String>>(results.len())
        });

        let err = orchestrate(plan, &executor, FailureStrategy::ContinueOnError, CancellationStrategy::Isolate)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AggregatedFailure(failures) if failures.len() == 2));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_before_any_node_runs() {
        let executor = executor_with(vec![]);
        let nodes = vec![node("a", &[]), node("a", &[])];
        let plan = OrchestrationPlan::new(nodes, |results: &ResultMap<String>| {
            Ok::<_, ExtractionError<String>>(results.len())
        });

        let err = orchestrate(plan, &executor, FailureStrategy::FailFast, CancellationStrategy::Isolate)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateId(id) if id == "a"));
    }

    #[tokio::test]
    async fn cascading_cancellation_cancels_a_pending_descendants_token() {
        // "a" is cancelled before it even runs; "x" is an unrelated sibling
        // that succeeds, so the layer isn't a total loss and the run
        // continues into the layer holding "b", which depends on "a".
        let executor = executor_with(vec![]);
        let token = CancellationToken::new();
        token.cancel();

        let mut a_config = TaskConfig::default();
        a_config.lifecycle = Lifecycle::BoundToOwner(token);

        let descendant_token = CancellationToken::new();
        let mut b_config = TaskConfig::default();
        b_config.lifecycle = Lifecycle::BoundToOwner(descendant_token.clone());

        let nodes = vec![
            OrchestrationNode::new("a".to_string(), RequestSpec::new("GET", "https://example.test", "/a"), a_config),
            OrchestrationNode::new("x".to_string(), RequestSpec::new("GET", "https://example.test", "/x"), TaskConfig::default()),
            OrchestrationNode::new("b".to_string(), RequestSpec::new("GET", "https://example.test", "/b"), b_config)
                .after("a".to_string()),
        ];
        let plan = OrchestrationPlan::new(nodes, |results: &ResultMap<String>| {
            Ok::<_, ExtractionError<String>>(results.len())
        });

        let count = orchestrate(plan, &executor, FailureStrategy::ContinueOnError, CancellationStrategy::Cascading)
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert!(descendant_token.is_cancelled());
    }
}
