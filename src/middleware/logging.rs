use std::sync::Arc;
use std::time::Instant;

use http::HeaderValue;

use super::core::{handler_fn, middleware_fn, Handler, Middleware};
use crate::context::Context;
use crate::error::classify;
use crate::ids::X_REQUEST_ID;
use crate::log::SharedLogger;

/// Access log: `METHOD path status latency` through the context's logger.
///
/// Failed chains are logged with the status the error handler will choose.
#[must_use]
pub fn logger() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |ctx: &mut Context| {
            let start = Instant::now();
            let result = next(ctx);
            let latency = start.elapsed();
            let status = match &result {
                Ok(()) => ctx.response().status(),
                Err(err) if !ctx.response().committed() => classify(err).0,
                Err(_) => ctx.response().status(),
            };
            let logger = ctx.logger();
            logger.info(
                ctx,
                format_args!("{} {} {} {:?}", ctx.method(), ctx.path(), status, latency),
            );
            result
        })
    })
}

/// Inject `logger` for every handler and middleware further down the chain.
#[must_use]
pub fn with_logger(logger: SharedLogger) -> Middleware {
    middleware_fn(move |next: Handler| {
        let logger = Arc::clone(&logger);
        handler_fn(move |ctx: &mut Context| {
            ctx.set_logger(Arc::clone(&logger));
            next(ctx)
        })
    })
}

/// Echo the request id in the `X-Request-Id` response header.
///
/// The header is set before the inner chain runs so it survives any body write.
#[must_use]
pub fn request_id_header() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |ctx: &mut Context| {
            let id = ctx.request_id().to_string();
            match HeaderValue::from_str(&id) {
                Ok(value) => ctx.response_mut().set_header(X_REQUEST_ID, value),
                Err(_) => tracing::warn!(request_id = %id, "Request id is not a valid header value"),
            }
            next(ctx)
        })
    })
}
