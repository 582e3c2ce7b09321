//! # Application
//!
//! [`App`] ties the pieces together: routes are registered with a handler and
//! optional route middleware, global middleware is added with
//! [`App::use_middleware`], and each registration composes its chain once.
//! [`App::serve`] answers a single request through any
//! [`ResponseSink`]; [`App::start`] binds the may_minihttp transport.
//!
//! ```rust
//! use brrtchain::app::App;
//! use brrtchain::middleware::logger;
//! use brrtchain::server::Recorder;
//!
//! let mut app = App::new();
//! app.use_middleware(logger());
//! app.get("/", |ctx| Ok(ctx.text(200, "Hello World!")?), &[]);
//!
//! let rec = Recorder::new();
//! let req = http::Request::builder().uri("/").body(Vec::new()).unwrap();
//! app.serve(req, rec.clone());
//! assert_eq!(rec.body_string(), "Hello World!");
//! ```

use std::fmt;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method};
use tracing::{debug, info, warn};

use crate::context::{Context, ContextPool, ContextServices, Values, DEFAULT_POOL_CAPACITY};
use crate::dispatcher::{DispatchReport, DispatchState, Dispatcher};
use crate::error::{default_error_handler_arc, ErrorHandler, HandlerResult};
use crate::ids::{RequestIdGenerator, RequestIdSource, UlidGenerator};
use crate::log::SharedLogger;
use crate::middleware::{compose, handler_fn, Handler, Middleware};
use crate::router::{RouteOutcome, Router};
use crate::runtime_config::RuntimeConfig;
use crate::server::{
    status_reason, AppService, HttpServer, Request, ResponseSink, ResponseTracker, ServerHandle,
};

/// Methods registered for a path, handed to the method-not-allowed
/// responder through [`RouteMiss::allowed`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllowedMethods(pub Vec<Method>);

impl AllowedMethods {
    /// `Allow` header value, e.g. `GET, POST`.
    #[must_use]
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What a fallback responder sees of a request no route answered.
#[derive(Debug, Clone, Copy)]
pub struct RouteMiss<'a> {
    pub request: &'a Request,
    /// Methods registered for the path. `Some` only for method-not-allowed.
    pub allowed: Option<&'a AllowedMethods>,
}

/// Writes the 404/405 response straight to the tracker.
///
/// Fallbacks run outside any chain: no global middleware, no error handler
/// and no pooled context. The `Allow` header is already set for 405.
pub type FallbackResponder =
    Arc<dyn Fn(&RouteMiss<'_>, &mut ResponseTracker) -> io::Result<()> + Send + Sync>;

fn plain_fallback(code: u16) -> FallbackResponder {
    Arc::new(move |_: &RouteMiss<'_>, res: &mut ResponseTracker| {
        res.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        res.write_header(code);
        res.write_all(status_reason(code).as_bytes())
    })
}

fn html_fallback(code: u16) -> FallbackResponder {
    Arc::new(move |_: &RouteMiss<'_>, res: &mut ResponseTracker| {
        let reason = status_reason(code);
        let body = format!(
            "<!DOCTYPE html>\n<html><head><title>{code} {reason}</title></head>\
             <body><h1>{reason}</h1></body></html>\n"
        );
        res.set_header(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        res.write_header(code);
        res.write_all(body.as_bytes())
    })
}

/// `404` with the plain-text body `Not Found`.
#[must_use]
pub fn plain_not_found() -> FallbackResponder {
    plain_fallback(404)
}

/// `405` with the plain-text body `Method Not Allowed`.
#[must_use]
pub fn plain_method_not_allowed() -> FallbackResponder {
    plain_fallback(405)
}

/// `404` as a small HTML page.
#[must_use]
pub fn html_not_found() -> FallbackResponder {
    html_fallback(404)
}

/// `405` as a small HTML page.
#[must_use]
pub fn html_method_not_allowed() -> FallbackResponder {
    html_fallback(405)
}

/// Construction-time configuration of an [`App`].
///
/// Every field has a default; nothing is shared between app instances.
pub struct AppConfig {
    /// Renders errors returned by a chain.
    pub error_handler: ErrorHandler,
    /// Application logger. `None` uses [`TracingLogger`](crate::log::TracingLogger).
    pub logger: Option<SharedLogger>,
    pub id_generator: Arc<dyn RequestIdGenerator>,
    pub id_source: RequestIdSource,
    /// Responder for unmatched paths.
    pub not_found: FallbackResponder,
    /// Responder for known paths with an unregistered method.
    pub method_not_allowed: FallbackResponder,
    pub pool_capacity: usize,
    /// Values every context of this app can read through [`Context::get`].
    pub ambient: Values,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            error_handler: default_error_handler_arc(),
            logger: None,
            id_generator: Arc::new(UlidGenerator),
            id_source: RequestIdSource::Standard,
            not_found: plain_not_found(),
            method_not_allowed: plain_method_not_allowed(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            ambient: Values::new(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("logger", &self.logger.is_some())
            .field("id_source", &self.id_source)
            .field("pool_capacity", &self.pool_capacity)
            .field("ambient", &self.ambient)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Defaults with the pool size and request-id source from `runtime`.
    #[must_use]
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            id_source: runtime.request_id_source.clone(),
            pool_capacity: runtime.context_pool_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = error_handler;
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, generator: Arc<dyn RequestIdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    /// HTML bodies for 404/405 instead of plain text.
    #[must_use]
    pub fn with_html_fallbacks(mut self) -> Self {
        self.not_found = html_not_found();
        self.method_not_allowed = html_method_not_allowed();
        self
    }
}

struct Route {
    handler: Handler,
    middleware: Vec<Middleware>,
    chain: Handler,
}

impl Route {
    fn compose(&mut self, global: &[Middleware]) {
        let mut all = Vec::with_capacity(global.len() + self.middleware.len());
        all.extend(global.iter().map(Arc::clone));
        all.extend(self.middleware.iter().map(Arc::clone));
        self.chain = compose(Arc::clone(&self.handler), &all);
    }
}

/// Application: route table, global middleware and the dispatcher.
///
/// Routes are registered through `&mut self` before serving; afterwards the
/// app is shared as `Arc<App>` and read-only.
pub struct App {
    router: Router<Route>,
    middleware: Vec<Middleware>,
    not_found: FallbackResponder,
    method_not_allowed: FallbackResponder,
    dispatcher: Dispatcher,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.router.len())
            .field("middleware", &self.middleware.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        let AppConfig {
            error_handler,
            logger,
            id_generator,
            id_source,
            not_found,
            method_not_allowed,
            pool_capacity,
            mut ambient,
        } = config;
        if let Some(logger) = logger {
            ambient.insert(logger);
        }
        let services = ContextServices {
            id_generator,
            id_source,
            ambient: Some(Arc::new(ambient)),
        };
        let pool = ContextPool::new(services, pool_capacity);
        Self {
            router: Router::new(),
            middleware: Vec::new(),
            not_found,
            method_not_allowed,
            dispatcher: Dispatcher::new(pool, error_handler),
        }
    }

    /// Add global middleware.
    ///
    /// Global middleware wraps every route, including routes registered
    /// earlier. Affected chains are recomposed here, never per request.
    /// The 404/405 responders are not wrapped.
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        let global = &self.middleware;
        self.router.for_each_mut(|_, route| route.compose(global));
        debug!(global = self.middleware.len(), "Global middleware added");
        self
    }

    /// Register `handler` for `method` on `path`, wrapped in the global
    /// middleware and then `middleware`.
    ///
    /// Registering the same method and path again replaces the route.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
        middleware: &[Middleware],
    ) -> &mut Self {
        let mut route = Route {
            chain: Arc::clone(&handler),
            handler,
            middleware: middleware.to_vec(),
        };
        route.compose(&self.middleware);
        if self.router.insert(method, path, route).is_some() {
            info!(path = %path, "Route replaced");
        }
        self
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Answer one request through `sink`.
    pub fn serve<S: ResponseSink + 'static>(&self, request: Request, sink: S) -> DispatchReport {
        self.serve_boxed(request, Box::new(sink))
    }

    pub fn serve_boxed(&self, request: Request, sink: Box<dyn ResponseSink>) -> DispatchReport {
        let outcome = self.router.lookup(request.method(), request.uri().path());
        match outcome {
            RouteOutcome::Matched { value, params } => {
                self.dispatcher.dispatch(&value.chain, sink, request, params)
            }
            RouteOutcome::MethodNotAllowed { allowed } => {
                let allowed = AllowedMethods(allowed);
                self.respond_miss(&self.method_not_allowed, request, Some(&allowed), sink)
            }
            RouteOutcome::NotFound => self.respond_miss(&self.not_found, request, None, sink),
        }
    }

    fn respond_miss(
        &self,
        responder: &FallbackResponder,
        request: Request,
        allowed: Option<&AllowedMethods>,
        sink: Box<dyn ResponseSink>,
    ) -> DispatchReport {
        let mut res = ResponseTracker::bound(sink);
        if let Some(allowed) = allowed {
            if let Ok(value) = HeaderValue::from_str(&allowed.header_value()) {
                res.set_header(ALLOW, value);
            }
        }
        let miss = RouteMiss {
            request: &request,
            allowed,
        };
        let outcome = match responder(&miss, &mut res) {
            Ok(()) => DispatchState::Completed,
            Err(err) => {
                warn!(
                    method = %request.method(),
                    path = %request.uri().path(),
                    error = %err,
                    "Fallback response write failed"
                );
                DispatchState::Failed
            }
        };
        debug!(
            status = res.status(),
            path = %request.uri().path(),
            "Route miss answered"
        );
        DispatchReport {
            status: res.status(),
            size: res.size(),
            outcome,
            request_id: None,
        }
    }

    /// Start serving on `addr` with may_minihttp.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self: Arc<Self>, addr: A) -> io::Result<ServerHandle> {
        HttpServer(AppService::new(self)).start(addr)
    }

    /// Serve on `addr` until the server stops.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start or its coroutine panicked.
    pub fn listen_and_serve<A: ToSocketAddrs>(self: Arc<Self>, addr: A) -> io::Result<()> {
        let handle = self.start(addr)?;
        info!(addr = %handle.addr(), "Listening");
        handle
            .join()
            .map_err(|_| io::Error::other("server coroutine panicked"))
    }
}

macro_rules! method_helpers {
    ($($(#[$doc:meta])* $name:ident => $method:expr;)*) => {
        impl App {
            $(
                $(#[$doc])*
                pub fn $name<F>(&mut self, path: &str, handler: F, middleware: &[Middleware]) -> &mut Self
                where
                    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
                {
                    self.register($method, path, handler_fn(handler), middleware)
                }
            )*
        }
    };
}

method_helpers! {
    /// Register a `GET` handler.
    get => Method::GET;
    /// Register a `POST` handler.
    post => Method::POST;
    /// Register a `PUT` handler.
    put => Method::PUT;
    /// Register a `PATCH` handler.
    patch => Method::PATCH;
    /// Register a `DELETE` handler.
    delete => Method::DELETE;
    /// Register an `OPTIONS` handler.
    options => Method::OPTIONS;
    /// Register a `HEAD` handler.
    head => Method::HEAD;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_methods_header_value() {
        let allowed = AllowedMethods(vec![Method::GET, Method::POST]);
        assert_eq!(allowed.header_value(), "GET, POST");
    }

    #[test]
    fn test_register_replaces_route() {
        let mut app = App::new();
        app.get("/", |ctx| Ok(ctx.text(200, "one")?), &[]);
        app.get("/", |ctx| Ok(ctx.text(200, "two")?), &[]);
        assert_eq!(app.route_count(), 1);
    }
}
