//! # Router Module
//!
//! Route matching for the application façade. The rest of the crate treats it
//! as a black box: a lookup yields the stored value plus path parameters, or
//! tells the caller the request is a 404 or a 405.
//!
//! ## Pattern syntax
//!
//! - `/users` matches exactly
//! - `/users/:id` and `/users/{id}` capture one segment as `id`
//! - `/static/*path` captures the remaining segments as `path`
//!
//! Static segments win over parameters, parameters over catch-alls.
//!
//! ## Example
//!
//! ```rust
//! use brrtchain::router::{RouteOutcome, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert(Method::GET, "/users/:id", "get_user");
//!
//! if let RouteOutcome::Matched { value, params } = router.lookup(&Method::GET, "/users/42") {
//!     assert_eq!(*value, "get_user");
//!     assert_eq!(params[0].1, "42");
//! }
//! ```

mod core;
mod radix;
#[cfg(test)]
mod tests;

pub use core::{ParamVec, RouteOutcome, Router, MAX_INLINE_PARAMS};
pub use radix::RadixRouter;
