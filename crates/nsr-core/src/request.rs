//! Request and response types seen by handlers.

use bytes::{Bytes, BytesMut};
use nsr_protocol::{Headers, Message, Reply};

/// Default description for an explicit error reply left without one.
pub const UNKNOWN_DESCRIPTION: &str = "unknown";

/// An inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Concrete subject the request arrived on.
    pub subject: String,
    /// Request payload.
    pub payload: Bytes,
    /// Request headers.
    pub headers: Headers,
}

impl Request {
    /// Create a request without headers.
    #[must_use]
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    /// Build a request from a transport message.
    #[must_use]
    pub fn from_message(message: Message) -> Self {
        Self {
            subject: message.subject,
            payload: message.payload,
            headers: message.headers,
        }
    }

    /// First value of a request header.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }
}

/// An explicit error requested by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitError {
    /// Error code.
    pub code: String,
    /// Error description; may be empty.
    pub description: String,
}

/// Response accumulator handed to handlers.
///
/// Writes are buffered; nothing reaches the requester until the handler
/// returns and the response is finished into a single [`Reply`].
#[derive(Debug, Default)]
pub struct Response {
    headers: Headers,
    body: BytesMut,
    error: Option<ExplicitError>,
}

impl Response {
    /// Create an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header value. Existing values for the key are kept.
    pub fn header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.append(key, value);
    }

    /// Append bytes to the body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.body.extend_from_slice(data.as_ref());
    }

    /// Force an error reply with `code` and `description`.
    ///
    /// A later call replaces an earlier one.
    pub fn write_error(&mut self, code: impl Into<String>, description: impl Into<String>) {
        self.error = Some(ExplicitError {
            code: code.into(),
            description: description.into(),
        });
    }

    /// Headers written so far.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The explicit error, if one was written.
    #[must_use]
    pub fn error(&self) -> Option<&ExplicitError> {
        self.error.as_ref()
    }

    /// Turn the buffered response into the reply for an explicit error or
    /// a success. Handler errors are resolved by [`crate::dispatch`].
    #[must_use]
    pub fn into_reply(self) -> Reply {
        match self.error {
            Some(ExplicitError { code, description }) => {
                let description = if description.is_empty() {
                    UNKNOWN_DESCRIPTION.to_string()
                } else {
                    description
                };
                Reply::Error { code, description }
            }
            None => Reply::Success {
                headers: self.headers,
                body: self.body.freeze(),
            },
        }
    }
}
