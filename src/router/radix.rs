//! Radix tree for HTTP route matching
//!
//! Paths are split into `/`-separated segments and stored as a tree where:
//! - static segments (e.g. `users`) match exactly
//! - parameter segments (`:id` or `{id}`) match any single segment
//! - a catch-all segment (`*rest`) matches the remainder of the path and must be last
//! - values are stored at terminal nodes, keyed by HTTP method
//!
//! Static children are tried before parameter children, which are tried before
//! the catch-all. Matching backtracks until every alternative is exhausted.
//!
//! Lookup is O(k) in the path length for the common case.

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

use super::core::ParamVec;

/// Kind of a parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

impl<'a> Segment<'a> {
    pub(crate) fn parse(segment: &'a str) -> Self {
        if let Some(name) = segment.strip_prefix(':') {
            Segment::Param(name)
        } else if let Some(name) = segment.strip_prefix('*') {
            Segment::CatchAll(name)
        } else if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
            Segment::Param(&segment[1..segment.len() - 1])
        } else {
            Segment::Static(segment)
        }
    }
}

/// Split a request path or pattern into non-empty segments.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone)]
struct RadixNode<T> {
    /// The path segment this node represents (without leading /)
    segment: String,
    /// Values per HTTP method when this node terminates a route
    routes: HashMap<Method, T>,
    /// Parameter name for `:name` / `{name}` and `*name` nodes
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode<T>>,
    /// Several parameter children may share a position
    /// (e.g. `/users/{id}/posts` and `/users/{user_id}/comments`).
    param_children: Vec<RadixNode<T>>,
    catch_all: Option<Box<RadixNode<T>>>,
}

impl<T> RadixNode<T> {
    fn new(segment: String) -> Self {
        Self {
            segment,
            routes: HashMap::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
            catch_all: None,
        }
    }

    fn new_param(param_name: &str) -> Self {
        let mut node = Self::new(String::new());
        node.param_name = Some(Arc::from(param_name));
        node
    }

    /// Insert a value, returning the previous value for the same method and path.
    fn insert(&mut self, segments: &[&str], method: Method, value: T) -> Option<T> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, value);
        };

        match Segment::parse(segment) {
            Segment::Param(name) => {
                if let Some(child) = self
                    .param_children
                    .iter_mut()
                    .find(|c| c.param_name.as_deref() == Some(name))
                {
                    return child.insert(remaining, method, value);
                }
                let mut child = RadixNode::new_param(name);
                let previous = child.insert(remaining, method, value);
                self.param_children.push(child);
                previous
            }
            Segment::CatchAll(name) => {
                // Anything after a catch-all is unreachable and ignored.
                let child = self
                    .catch_all
                    .get_or_insert_with(|| Box::new(RadixNode::new_param(name)));
                child.param_name = Some(Arc::from(name));
                child.routes.insert(method, value)
            }
            Segment::Static(segment) => {
                if let Some(child) = self.children.iter_mut().find(|c| c.segment == segment) {
                    return child.insert(remaining, method, value);
                }
                let mut child = RadixNode::new(segment.to_string());
                let previous = child.insert(remaining, method, value);
                self.children.push(child);
                previous
            }
        }
    }

    fn search<'n>(
        &'n self,
        segments: &[&str],
        method: &Method,
        params: &mut ParamVec,
    ) -> Option<&'n T> {
        let Some((&segment, remaining)) = segments.split_first() else {
            if let Some(value) = self.routes.get(method) {
                return Some(value);
            }
            return self.search_catch_all(segments, method, params);
        };

        for child in &self.children {
            if child.segment == segment {
                if let Some(value) = child.search(remaining, method, params) {
                    return Some(value);
                }
            }
        }

        for param_child in &self.param_children {
            if let Some(name) = &param_child.param_name {
                params.push((Arc::clone(name), segment.to_string()));
                if let Some(value) = param_child.search(remaining, method, params) {
                    return Some(value);
                }
                // Backtrack
                params.pop();
            }
        }

        self.search_catch_all(segments, method, params)
    }

    fn search_catch_all<'n>(
        &'n self,
        segments: &[&str],
        method: &Method,
        params: &mut ParamVec,
    ) -> Option<&'n T> {
        let node = self.catch_all.as_deref()?;
        let value = node.routes.get(method)?;
        if let Some(name) = &node.param_name {
            params.push((Arc::clone(name), segments.join("/")));
        }
        Some(value)
    }

    /// Collect every method registered on a node that `segments` can reach.
    fn allowed(&self, segments: &[&str], out: &mut Vec<Method>) {
        let Some((&segment, remaining)) = segments.split_first() else {
            out.extend(self.routes.keys().cloned());
            if let Some(node) = &self.catch_all {
                out.extend(node.routes.keys().cloned());
            }
            return;
        };
        for child in &self.children {
            if child.segment == segment {
                child.allowed(remaining, out);
            }
        }
        for param_child in &self.param_children {
            param_child.allowed(remaining, out);
        }
        if let Some(node) = &self.catch_all {
            out.extend(node.routes.keys().cloned());
        }
    }

    fn for_each_mut<F: FnMut(&Method, &mut T)>(&mut self, f: &mut F) {
        for (method, value) in &mut self.routes {
            f(method, value);
        }
        for child in &mut self.children {
            child.for_each_mut(f);
        }
        for child in &mut self.param_children {
            child.for_each_mut(f);
        }
        if let Some(node) = &mut self.catch_all {
            node.for_each_mut(f);
        }
    }
}

/// Radix tree router mapping `(method, path pattern)` to values of type `T`.
#[derive(Clone)]
pub struct RadixRouter<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> Default for RadixRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RadixRouter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RadixNode::new(String::new()),
            len: 0,
        }
    }

    /// Register `value` for `method` on `pattern`.
    ///
    /// Returns the value previously registered for the same method and pattern.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> Option<T> {
        let segments = split_path(pattern);
        let previous = self.root.insert(&segments, method, value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Match a request. Path parameters are returned in path order.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<(&T, ParamVec)> {
        let segments = split_path(path);
        let mut params = ParamVec::new();
        let value = self.root.search(&segments, method, &mut params)?;
        Some((value, params))
    }

    /// Methods registered on any route matching `path`, sorted and deduplicated.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let segments = split_path(path);
        let mut methods = Vec::new();
        self.root.allowed(&segments, &mut methods);
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods.dedup();
        methods
    }

    /// Visit every stored value.
    pub fn for_each_mut<F: FnMut(&Method, &mut T)>(&mut self, mut f: F) {
        self.root.for_each_mut(&mut f);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
