//! # Middleware Module
//!
//! Decorator-style middleware composed around route handlers.
//!
//! A [`Middleware`] takes the next [`Handler`] and returns a new one. Chains are
//! built once per route with [`compose`], global middleware first:
//!
//! ```text
//! compose(h, [global0, global1, route0]) == global0(global1(route0(h)))
//! ```
//!
//! so `global0` sees the request first and the result last. A middleware that
//! returns without calling `next` short-circuits everything inside it. Errors
//! travel outwards unchanged unless a middleware decides to transform them.
//!
//! ## Built-in middleware
//!
//! - [`logger`] - access log through the context's logger
//! - [`with_logger`] - inject a logger for the rest of the chain
//! - [`request_id_header`] - echo the request id as `X-Request-Id`
//! - [`tracing_span`] - run the chain inside a `tracing` span
//! - [`recover`] - convert handler panics into `500` errors
//! - [`Metrics::middleware`] - request/latency counters

mod core;
mod logging;
mod metrics;
mod recover;
mod tracing;

pub use core::{compose, handler_fn, middleware_fn, Handler, HandlerResult, Middleware};
pub use logging::{logger, request_id_header, with_logger};
pub use metrics::Metrics;
pub use recover::recover;
pub use tracing::tracing_span;
