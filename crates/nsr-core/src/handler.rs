//! Handler contract.

use crate::request::{Request, Response};
use std::sync::Arc;

/// Error type returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by handlers.
pub type HandlerResult = Result<(), BoxError>;

/// A request handler.
///
/// Handlers write into the [`Response`] and return `Err` to fail the request
/// with a `HandlerError` reply.
pub type Handler = Arc<dyn Fn(&mut Response, &Request) -> HandlerResult + Send + Sync>;

/// Wrap a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Response, &Request) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}
