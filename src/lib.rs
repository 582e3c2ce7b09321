//! # brrtchain
//!
//! **brrtchain** is a small request-lifecycle core for HTTP services on the
//! `may` coroutine runtime: pooled request contexts, decorator middleware
//! chains composed once per route, and a response tracker that writes headers
//! exactly once.
//!
//! ## Architecture
//!
//! - **[`context`]** - per-request [`Context`]: params, request id, typed values,
//!   cancellation, response emission; recycled through a [`ContextPool`]
//! - **[`middleware`]** - [`Handler`] / [`Middleware`] types, [`compose`] and built-ins
//! - **[`server`]** - [`ResponseSink`], [`ResponseTracker`], the in-memory
//!   [`Recorder`] and the may_minihttp binding
//! - **[`dispatcher`]** - runs a composed chain against a pooled context
//! - **[`error`]** - crate [`Error`], [`HttpError`] and error classification
//! - **[`app`]** - [`App`]: registration, global middleware, serving
//! - **[`router`]** - radix-tree route matching
//! - **[`log`]** - the narrow [`Logger`](log::Logger) interface
//! - **[`ids`]** - request id generation and extraction
//! - **[`runtime_config`]** / **[`otel`]** - environment configuration and
//!   logging setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HttpServer<br/>(may_minihttp)
//!     participant App as App
//!     participant Router as Router
//!     participant Dispatcher as Dispatcher
//!     participant Pool as ContextPool
//!     participant Chain as Middleware Chain
//!
//!     Client->>Server: GET /users/42
//!     Server->>App: serve(request, Recorder)
//!     App->>Router: lookup(GET, "/users/42")
//!     alt No Route Match
//!         Router-->>App: NotFound / MethodNotAllowed
//!         App->>App: fallback responder writes 404/405 (no chain)
//!     end
//!     Router-->>App: chain + {id: "42"}
//!     App->>Dispatcher: dispatch(chain, sink, request, params)
//!     Dispatcher->>Pool: checkout()
//!     Dispatcher->>Chain: chain(&mut ctx)
//!     Chain->>Chain: global → route → handler
//!     alt Chain returned Err
//!         Dispatcher->>Dispatcher: ErrorHandler(ctx, err)
//!     end
//!     Dispatcher->>Pool: cancel + release
//!     Server-->>Client: recorded status, headers, body
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use brrtchain::{App, HttpError};
//! use brrtchain::middleware::{logger, recover};
//!
//! let mut app = App::new();
//! app.use_middleware(recover());
//! app.use_middleware(logger());
//! app.get("/", |ctx| Ok(ctx.text(200, "Hello World!")?), &[]);
//! app.get("/users/:id", |ctx| {
//!     let id = ctx.param("id").ok_or_else(|| HttpError::bad_request("missing id"))?.to_string();
//!     Ok(ctx.json(200, &serde_json::json!({ "user": id }))?)
//! }, &[]);
//!
//! Arc::new(app).listen_and_serve("127.0.0.1:8080").unwrap();
//! ```

pub mod app;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod log;
pub mod middleware;
pub mod otel;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use app::{AllowedMethods, App, AppConfig, FallbackResponder, RouteMiss};
pub use context::{CancelSignal, Context, ContextPool};
pub use dispatcher::{DispatchReport, DispatchState, Dispatcher};
pub use error::{classify, default_error_handler, Error, ErrorHandler, HandlerResult, HttpError, Result};
pub use middleware::{compose, handler_fn, middleware_fn, Handler, Middleware};
pub use server::{Recorder, Request, ResponseSink, ResponseTracker};
