//! Message and reply types exchanged with a transport.

use crate::headers::Headers;
use bytes::Bytes;

/// Header carrying the error description of a service error reply.
pub const ERROR_HEADER: &str = "Nats-Service-Error";

/// Header carrying the error code of a service error reply.
pub const ERROR_CODE_HEADER: &str = "Nats-Service-Error-Code";

/// An inbound message as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Concrete subject the message was published on.
    pub subject: String,
    /// Message headers.
    pub headers: Headers,
    /// Message payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a new message without headers.
    #[must_use]
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            headers: Headers::new(),
            payload: payload.into(),
        }
    }

    /// Attach headers to the message.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Append a single header value.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }
}

/// The outcome sent back to a requester. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Successful reply with headers and body.
    Success {
        /// Reply headers.
        headers: Headers,
        /// Reply body.
        body: Bytes,
    },
    /// Error reply.
    Error {
        /// Error code.
        code: String,
        /// Human-readable description.
        description: String,
    },
}

impl Reply {
    /// Create a success reply.
    #[must_use]
    pub fn success(headers: Headers, body: impl Into<Bytes>) -> Self {
        Reply::Success {
            headers,
            body: body.into(),
        }
    }

    /// Create an error reply.
    #[must_use]
    pub fn error(code: impl Into<String>, description: impl Into<String>) -> Self {
        Reply::Error {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Check if this is an error reply.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    /// Error code, if this is an error reply.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Reply::Error { code, .. } => Some(code),
            Reply::Success { .. } => None,
        }
    }

    /// Body of a success reply, empty for errors.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        match self {
            Reply::Success { body, .. } => &body[..],
            Reply::Error { .. } => &[],
        }
    }

    /// Convert into the `(headers, body)` pair carried on the wire.
    ///
    /// Error replies become an empty body with [`ERROR_HEADER`] and
    /// [`ERROR_CODE_HEADER`] set. Those headers are reserved and are
    /// stripped from success replies.
    #[must_use]
    pub fn into_parts(self) -> (Headers, Bytes) {
        match self {
            Reply::Success {
                mut headers,
                body,
            } => {
                headers.remove(ERROR_HEADER);
                headers.remove(ERROR_CODE_HEADER);
                (headers, body)
            }
            Reply::Error { code, description } => {
                let mut headers = Headers::new();
                headers.set(ERROR_HEADER, description);
                headers.set(ERROR_CODE_HEADER, code);
                (headers, Bytes::new())
            }
        }
    }

    /// Rebuild a reply from its wire `(headers, body)` pair.
    #[must_use]
    pub fn from_parts(headers: Headers, body: Bytes) -> Self {
        match headers.get(ERROR_CODE_HEADER).map(str::to_owned) {
            Some(code) => {
                let description = headers
                    .get(ERROR_HEADER)
                    .map(str::to_owned)
                    .unwrap_or_default();
                Reply::Error { code, description }
            }
            None => Reply::Success { headers, body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::new("orders.created", b"hello".to_vec())
            .with_header("trace", "1")
            .with_header("trace", "2");
        assert_eq!(msg.subject, "orders.created");
        assert_eq!(&msg.payload[..], b"hello");
        assert_eq!(msg.headers.get_all("trace"), ["1", "2"]);
    }

    #[test]
    fn test_error_reply_wire_headers() {
        let (headers, body) = Reply::error("NotFoundError", "no route").into_parts();
        assert!(body.is_empty());
        assert_eq!(headers.get(ERROR_CODE_HEADER), Some("NotFoundError"));
        assert_eq!(headers.get(ERROR_HEADER), Some("no route"));

        let reply = Reply::from_parts(headers, body);
        assert_eq!(reply.error_code(), Some("NotFoundError"));
    }

    #[test]
    fn test_success_reply_keeps_headers() {
        let mut headers = Headers::new();
        headers.append("k", "v");
        let reply = Reply::from_parts(headers.clone(), Bytes::from_static(b"ok"));
        assert_eq!(reply, Reply::success(headers, Bytes::from_static(b"ok")));
        assert!(!reply.is_error());
        assert_eq!(reply.body(), b"ok");
    }

    #[test]
    fn test_success_reply_strips_reserved_headers() {
        let mut headers = Headers::new();
        headers.append("k", "v");
        headers.append(ERROR_CODE_HEADER, "Spoofed");
        headers.append(ERROR_HEADER, "not an error");

        let (wire, body) = Reply::success(headers, Bytes::from_static(b"ok")).into_parts();
        assert_eq!(wire.get(ERROR_CODE_HEADER), None);
        assert_eq!(wire.get(ERROR_HEADER), None);
        assert_eq!(wire.get("k"), Some("v"));

        let reply = Reply::from_parts(wire, body);
        assert!(!reply.is_error());
        assert_eq!(reply.body(), b"ok");
    }
}
