//! Request dispatch and outcome resolution.
//!
//! One dispatch builds a [`Request`] from a transport message, runs the
//! handler against a fresh [`Response`] and resolves exactly one [`Reply`],
//! in this order:
//!
//! 1. the handler returned an error: `HandlerError` with the error message,
//!    no body;
//! 2. the handler called [`Response::write_error`]: that code, description
//!    `"unknown"` if left empty;
//! 3. otherwise a success carrying the buffered headers and body.

use crate::handler::{handler, Handler, HandlerResult};
use crate::request::{Request, Response};
use nsr_protocol::{Message, Reply};

/// Code of the reply sent when a handler returns an error.
pub const HANDLER_ERROR_CODE: &str = "HandlerError";

/// Code of the reply sent when no pattern matches and no default handler is set.
pub const NOT_FOUND_CODE: &str = "NotFoundError";

/// Resolve the reply for a finished handler invocation.
#[must_use]
pub fn resolve(response: Response, result: HandlerResult) -> Reply {
    match result {
        Err(e) => Reply::error(HANDLER_ERROR_CODE, e.to_string()),
        Ok(()) => response.into_reply(),
    }
}

/// Run `handler` for a raw message and resolve its reply.
#[must_use]
pub fn dispatch(handler: &Handler, message: Message) -> Reply {
    let request = Request::from_message(message);
    let mut response = Response::new();
    let result = handler(&mut response, &request);
    resolve(response, result)
}

/// Handler answering every request with a `NotFoundError` reply.
#[must_use]
pub fn not_found() -> Handler {
    handler(|response, request| {
        response.write_error(
            NOT_FOUND_CODE,
            format!("no handler for subject '{}'", request.subject),
        );
        Ok(())
    })
}
