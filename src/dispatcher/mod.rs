//! # Dispatcher Module
//!
//! The dispatch adapter between the transport and a route's composed chain.
//!
//! ## Request Flow
//!
//! 1. The router matches a request → composed chain + path params
//! 2. The dispatcher checks a [`Context`](crate::context::Context) out of the pool
//!    and binds the sink, request and params to it
//! 3. The chain runs
//! 4. A returned error goes to the configured
//!    [`ErrorHandler`](crate::error::ErrorHandler), which writes through the
//!    same response tracker
//! 5. The context's cancel signal fires and the context is released
//!
//! Each transition is logged at `debug` with a `state` field
//! ([`DispatchState`]).
//!
//! ## Error Handling
//!
//! - Handler errors never escape `dispatch`; they become responses
//! - An error after the response was committed is logged but does not
//!   rewrite the response
//! - Panics are not caught here (install [`recover`](crate::middleware::recover)
//!   for that), but the context is still returned to the pool during unwind

mod core;

pub use core::{DispatchReport, DispatchState, Dispatcher};
