use std::sync::Arc;

use crate::context::Context;
pub use crate::error::HandlerResult;

/// Terminal request handler, or a handler already wrapped in middleware.
pub type Handler = Arc<dyn Fn(&mut Context) -> HandlerResult + Send + Sync>;

/// Decorator taking the next handler and returning a wrapped one.
///
/// A middleware may run code before and after calling `next`, or return
/// without calling it at all to short-circuit the chain.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Fold `middleware` around `handler`.
///
/// `compose(h, &[m0, m1, m2])` is `m0(m1(m2(h)))`: `m0` runs first on entry
/// and last on exit. An empty list returns `handler` itself.
#[must_use]
pub fn compose(handler: Handler, middleware: &[Middleware]) -> Handler {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, mw| mw(next))
}
