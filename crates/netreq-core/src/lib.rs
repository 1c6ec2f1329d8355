//! Core infrastructure shared across the request execution pipeline.
//!
//! This crate provides the pieces every other `netreq-*` crate depends on:
//! - [`NetError`], the unified error taxonomy
//! - An event system for observability hooks (`on_hit`, `on_retry`, ...)

pub mod error;
pub mod events;

pub use error::NetError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
