use std::time::Instant;

use tracing::{field, info_span};

use super::core::{handler_fn, middleware_fn, Handler, Middleware};
use crate::context::Context;

/// Run the rest of the chain inside a `request` span.
///
/// The span carries `method`, `path` and `request_id`; `status` and
/// `latency_ms` are recorded when the inner chain returns.
#[must_use]
pub fn tracing_span() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |ctx: &mut Context| {
            let request_id = ctx.request_id().to_string();
            let span = info_span!(
                "request",
                method = %ctx.method(),
                path = %ctx.path(),
                request_id = %request_id,
                status = field::Empty,
                latency_ms = field::Empty,
            );
            let _entered = span.enter();
            let start = Instant::now();
            let result = next(ctx);
            span.record("status", ctx.response().status());
            span.record("latency_ms", start.elapsed().as_millis() as u64);
            if let Err(err) = &result {
                tracing::debug!(error = %err, "Chain returned an error");
            }
            result
        })
    })
}
