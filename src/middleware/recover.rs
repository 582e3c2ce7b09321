use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use super::core::{handler_fn, middleware_fn, Handler, Middleware};
use crate::context::Context;
use crate::error::HttpError;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        format!("{payload:?}")
    }
}

/// Turn a panic in the inner chain into a `500 Internal Server Error`.
///
/// The panic is logged with a backtrace and reported to the application's
/// error handler as an [`HttpError`].
#[must_use]
pub fn recover() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |ctx: &mut Context| {
            match catch_unwind(AssertUnwindSafe(|| next(&mut *ctx))) {
                Ok(result) => result,
                Err(payload) => {
                    let panic_message = panic_message(payload.as_ref());
                    let backtrace = std::backtrace::Backtrace::capture();
                    error!(
                        request_id = ctx.cached_request_id().unwrap_or("-"),
                        method = %ctx.method(),
                        path = %ctx.path(),
                        panic_message = %panic_message,
                        backtrace = %backtrace,
                        "Handler panicked - CRITICAL"
                    );
                    Err(HttpError::from_status(500).into())
                }
            }
        })
    })
}
