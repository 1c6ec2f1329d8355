//! Unified error taxonomy for the request execution pipeline.
//!
//! Every component in the crate — the control gate, the cache, the retry
//! engine, the token refresh coordinator, the task executor and the
//! orchestrator — reports failures through a single [`NetError`] enum rather
//! than a per-component error type. This mirrors how a stacked Tower service
//! would otherwise need one `From` impl per layer; here the layers are all
//! internal to one facade, so one shared enum does the same job without the
//! composition boilerplate.
//!
//! # Example
//!
//! ```
//! use netreq_core::NetError;
//!
//! fn handle(err: NetError) {
//!     if err.is_retryable() {
//!         // the retry engine will have already attempted this class of error
//!     } else if err.is_unauthorized() {
//!         // trigger a token refresh
//!     }
//! }
//! ```

use std::time::Duration;

/// Errors produced anywhere in the request execution pipeline.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The operation was cancelled, either by the caller or by a competing
    /// debounce/dedup decision.
    #[error("cancelled")]
    Cancelled,

    /// A per-attempt or total execution timeout elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// No network connectivity was available to the transport.
    #[error("no network connectivity")]
    NoNetwork,

    /// The server responded with a non-2xx status.
    ///
    /// A `code` of `401` is treated as the `Unauthorized` subclass described
    /// by [`NetError::is_unauthorized`].
    #[error("server error {code}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    ServerError {
        /// HTTP-style status code.
        code: u16,
        /// Optional server-provided message body.
        message: Option<String>,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode response: {0}")]
    DecodingFailed(String),

    /// Token acquisition or refresh failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The retry engine exhausted its attempt budget.
    #[error("retry exhausted after last error: {0}")]
    RetryExhausted(Box<NetError>),

    /// The request's URL could not be constructed or parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An error that does not fit any other category.
    #[error("unknown error: {0}")]
    Unknown(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl NetError {
    /// A `ServerError` with code `401`.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, NetError::ServerError { code: 401, .. })
    }

    /// Returns `true` for error kinds the retry engine is allowed to recover
    /// from: timeouts, missing connectivity, and 5xx server errors. `401` is
    /// handled separately by the token refresh coordinator, not by retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Timeout(_) | NetError::NoNetwork => true,
            NetError::ServerError { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a `Cancelled` error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetError::Cancelled)
    }
}
