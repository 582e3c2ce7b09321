//! # Context Module
//!
//! Per-request state carried through the middleware chain.
//!
//! ## Overview
//!
//! A [`Context`] bundles everything one request needs:
//!
//! - the [`ResponseTracker`](crate::server::ResponseTracker) for the outgoing response
//! - the inbound request and the matched path parameters
//! - a lazily computed request id
//! - a typed [`Values`] store for cross-cutting data (logger, deadline), with a
//!   fallback to application-wide ambient values
//! - a one-shot [`CancelSignal`]
//!
//! ## Lifecycle
//!
//! Contexts are recycled through a [`ContextPool`]:
//!
//! 1. `acquire` takes an idle context (or allocates one)
//! 2. `reset` installs the sink, request and params
//! 3. the chain runs
//! 4. the cancel signal fires
//! 5. `release` clears the context and returns it to the free list
//!
//! A released context holds no request data, so nothing leaks between requests.

mod cancel;
mod core;
mod pool;
mod values;

pub use cancel::CancelSignal;
pub use core::{Context, ContextServices, Deadline, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};
pub use pool::{ContextPool, PoolStats, PooledContext, DEFAULT_POOL_CAPACITY};
pub use values::Values;
