//! Router core - route lookup on the request hot path.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

use super::radix::RadixRouter;

/// Maximum number of path parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated path parameter storage, in path order.
///
/// Param names are `Arc<str>` shared with the route tree, so matching only
/// allocates for the values taken from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of looking a request up in a [`Router`].
#[derive(Debug)]
pub enum RouteOutcome<'r, T> {
    /// A route matched both path and method.
    Matched { value: &'r T, params: ParamVec },
    /// The path is known but not for this method.
    MethodNotAllowed { allowed: Vec<Method> },
    /// Nothing matches the path.
    NotFound,
}

impl<T> RouteOutcome<'_, T> {
    /// Status code a fallback responder should use.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            RouteOutcome::Matched { .. } => 200,
            RouteOutcome::MethodNotAllowed { .. } => 405,
            RouteOutcome::NotFound => 404,
        }
    }
}

/// Method + path pattern table.
///
/// Patterns use `/`-separated segments; `:name` and `{name}` capture one
/// segment, a trailing `*name` captures the rest of the path.
#[derive(Clone)]
pub struct Router<T> {
    tree: RadixRouter<T>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RadixRouter::new(),
        }
    }

    /// Register a route. A second registration for the same method and
    /// pattern replaces the first and returns it.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> Option<T> {
        debug!(method = %method, pattern = %pattern, "Route registered");
        self.tree.insert(method, pattern, value)
    }

    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> RouteOutcome<'_, T> {
        if let Some((value, params)) = self.tree.route(method, path) {
            return RouteOutcome::Matched { value, params };
        }
        let allowed = self.tree.allowed_methods(path);
        if allowed.is_empty() {
            RouteOutcome::NotFound
        } else {
            RouteOutcome::MethodNotAllowed { allowed }
        }
    }

    /// Visit every registered route.
    pub fn for_each_mut<F: FnMut(&Method, &mut T)>(&mut self, f: F) {
        self.tree.for_each_mut(f);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
