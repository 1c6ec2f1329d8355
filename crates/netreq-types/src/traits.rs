//! External collaborator capabilities consumed by the core (spec.md §6).
//!
//! These traits are the boundary between the pipeline and the outside
//! world: the concrete transport, and wherever tokens come from. The core
//! never implements them — callers do, and hand an `Arc<dyn Engine>` /
//! `Arc<dyn TokenStore>` / `Arc<dyn TokenRefresher>` to the executor.

use bytes::Bytes;
use netreq_core::NetError;
use std::collections::HashMap;

/// A raw, materialized request ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// A raw transport response: status code, headers and body bytes.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

/// The concrete transport capability. Not part of this crate's
/// responsibility to implement — `streamOnce` (SSE) is explicitly out of
/// scope for this core and lives in a separate stream module.
#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    /// Sends `request` once and returns its raw response. Must be
    /// cancel-safe: dropping the future must cancel the underlying
    /// transport call.
    async fn send_once(&self, request: RawRequest) -> Result<RawResponse, NetError>;
}

/// Reads the currently held token, used to stamp every attempt (including
/// after a refresh).
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Option<String>;
}

/// Performs an actual token refresh. Invoked by `TokenRefreshCoordinator`,
/// never called directly by the executor.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<String, NetError>;
}
