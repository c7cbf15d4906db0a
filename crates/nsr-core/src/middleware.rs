//! Middleware composition.
//!
//! A middleware takes the next handler and returns a handler wrapping it.
//! Given middlewares registered as `[m1, m2, .., mn]` and a handler `h`, the
//! composed handler is `m1(m2(..mn(h)))`: the first registered runs
//! outermost.
//!
//! A middleware may short-circuit by not calling `next`, write to the
//! response itself, or return an error.

use crate::handler::{handler, Handler};
use crate::logging::Logger;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// A function transforming a handler into a handler.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Wrap a closure into a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `handler` in `middlewares`, first registered outermost.
#[must_use]
pub fn compose(middlewares: &[Middleware], handler: Handler) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware(next))
}

/// Request logging middleware.
///
/// Every request gets a fresh correlation ID. Start and completion are
/// logged inside a `request` span carrying the ID and subject. The inner
/// handler's result is returned unchanged.
#[must_use]
pub fn logger(log: Logger) -> Middleware {
    middleware(move |next: Handler| -> Handler {
        let log = log.clone();
        handler(move |response, request| {
            log.in_scope(|| {
                let id = Uuid::new_v4();
                let span = info_span!("request", id = %id, subject = %request.subject);
                let _enter = span.enter();

                info!("handling request");
                let start = Instant::now();
                let result = next(response, request);
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

                match (&result, response.error()) {
                    (Err(e), _) => warn!(error = %e, elapsed_ms, "request finished"),
                    (Ok(()), Some(explicit)) => {
                        warn!(code = %explicit.code, elapsed_ms, "request finished")
                    }
                    (Ok(()), None) => info!(elapsed_ms, "request finished"),
                }

                result
            })
        })
    })
}
