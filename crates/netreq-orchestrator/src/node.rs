//! The nodes and plan a caller submits to [`crate::orchestrate`].

use bytes::Bytes;
use netreq_core::NetError;
use netreq_types::{RequestSpec, TaskConfig};
use std::fmt;
use std::hash::Hash;

/// One unit of work in a DAG: a request plus the ids it depends on.
///
/// `deps` lists ids that must complete (successfully or not) before this
/// node becomes eligible to run; it does not itself guard against an id
/// depending on a node that doesn't exist or on itself transitively — that
/// validation happens once, in [`crate::orchestrate`], before anything runs.
#[derive(Debug, Clone)]
pub struct OrchestrationNode<Id> {
    pub id: Id,
    pub request: RequestSpec,
    pub config: TaskConfig,
    pub deps: Vec<Id>,
}

impl<Id> OrchestrationNode<Id> {
    pub fn new(id: Id, request: RequestSpec, config: TaskConfig) -> Self {
        Self {
            id,
            request,
            config,
            deps: Vec::new(),
        }
    }

    /// Declares that this node depends on `dep`.
    pub fn after(mut self, dep: Id) -> Self {
        self.deps.push(dep);
        self
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = Id>) -> Self {
        self.deps.extend(deps);
        self
    }
}

/// Raised by a plan's `transform` when the id-keyed result map doesn't carry
/// what the caller expected.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError<Id: fmt::Debug> {
    #[error("no result recorded for node {0:?}")]
    MissingKey(Id),
    #[error("result for node {0:?} failed: {1}")]
    NodeErrored(Id, NetError),
    #[error("could not decode result for node {0:?}: {1}")]
    Decode(Id, String),
}

/// The id-keyed results a plan's `transform` reads from.
pub type ResultMap<Id> = hashbrown::HashMap<Id, Result<Bytes, NetError>>;
type Transform<Id, T> = Box<dyn Fn(&ResultMap<Id>) -> Result<T, ExtractionError<Id>> + Send + Sync>;

/// A DAG of [`OrchestrationNode`]s plus the function that turns the raw,
/// id-keyed byte results into a typed `T` once every layer has run.
///
/// Keeping the extraction function on the plan (rather than having
/// `orchestrate` return the raw map) is the one place a caller downcasts or
/// decodes bytes into application types; the orchestrator core itself only
/// ever moves `Bytes` around.
pub struct OrchestrationPlan<Id, T> {
    pub(crate) nodes: Vec<OrchestrationNode<Id>>,
    pub(crate) transform: Transform<Id, T>,
}

impl<Id, T> OrchestrationPlan<Id, T>
where
    Id: Clone + Eq + Hash + fmt::Debug,
{
    pub fn new<F>(nodes: Vec<OrchestrationNode<Id>>, transform: F) -> Self
    where
        F: Fn(&ResultMap<Id>) -> Result<T, ExtractionError<Id>> + Send + Sync + 'static,
    {
        Self {
            nodes,
            transform: Box::new(transform),
        }
    }
}

/// Looks up `id` in `results`, returning its body or an [`ExtractionError`]
/// if it's missing or failed. A small convenience for `transform` closures.
pub fn require<Id>(results: &ResultMap<Id>, id: &Id) -> Result<Bytes, ExtractionError<Id>>
where
    Id: Clone + Eq + Hash + fmt::Debug,
{
    match results.get(id) {
        Some(Ok(bytes)) => Ok(bytes.clone()),
        Some(Err(err)) => Err(ExtractionError::NodeErrored(id.clone(), clone_into_owned(err))),
        None => Err(ExtractionError::MissingKey(id.clone())),
    }
}

/// Reconstructs an owned [`NetError`] from a borrowed one. `NetError` can't
/// derive `Clone` because of its `Unknown` variant; this rebuilds every
/// other variant field-by-field and folds `Unknown`'s message into a fresh
/// boxed error for the rest.
pub(crate) fn clone_into_owned(err: &NetError) -> NetError {
    match err {
        NetError::Cancelled => NetError::Cancelled,
        NetError::Timeout(d) => NetError::Timeout(*d),
        NetError::NoNetwork => NetError::NoNetwork,
        NetError::ServerError { code, message } => NetError::ServerError {
            code: *code,
            message: message.clone(),
        },
        NetError::DecodingFailed(msg) => NetError::DecodingFailed(msg.clone()),
        NetError::AuthenticationFailed(msg) => NetError::AuthenticationFailed(msg.clone()),
        NetError::RetryExhausted(inner) => NetError::RetryExhausted(Box::new(clone_into_owned(inner))),
        NetError::InvalidUrl(msg) => NetError::InvalidUrl(msg.clone()),
        NetError::Unknown(inner) => NetError::Unknown(Box::new(std::io::Error::other(inner.to_string()))),
    }
}
