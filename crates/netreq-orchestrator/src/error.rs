//! Errors the orchestrator itself can raise, as distinct from the
//! [`netreq_core::NetError`] a single node's execution can fail with.

use crate::node::ExtractionError;
use netreq_core::NetError;
use std::fmt;

/// Failures raised by [`crate::orchestrate`] before or after running nodes.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError<Id: fmt::Debug> {
    /// Two nodes in the plan shared the same id.
    #[error("duplicate node id: {0:?}")]
    DuplicateId(Id),

    /// A node declared a dependency on an id not present in the plan.
    #[error("dependency id not found in plan: {0:?}")]
    UndefinedDependency(Id),

    /// The dependency graph has no valid topological ordering.
    #[error("cyclic dependency among the plan's nodes")]
    CyclicDependency,

    /// `FailFast`: this node failed and aborted the layer.
    #[error("node {0:?} failed: {1}")]
    NodeFailed(Id, NetError),

    /// `ContinueOnError`: every runnable node in a layer failed, with no
    /// successes to carry forward.
    #[error("all {} runnable node(s) in a layer failed", .0.len())]
    AggregatedFailure(Vec<(Id, NetError)>),

    /// The plan's `transform` could not build its result from the
    /// completed nodes.
    #[error("result extraction failed: {0}")]
    Extraction(#[from] ExtractionError<Id>),
}
