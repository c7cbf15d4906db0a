//! Frame types for byte-stream transports.
//!
//! Frames carry requests and replies between a client and a TCP endpoint.
//! Each frame is serialized using MessagePack.

use crate::headers::Headers;
use crate::message::{Message, Reply};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Request addressed to a subject.
    #[serde(rename = "request")]
    Request {
        /// Request ID, echoed by the reply.
        id: u64,
        /// Concrete subject.
        subject: String,
        /// Request headers.
        #[serde(default)]
        headers: Headers,
        /// Request payload.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },

    /// Reply to a request.
    #[serde(rename = "reply")]
    Reply {
        /// ID of the request being answered.
        id: u64,
        /// Reply headers, including service error headers for error replies.
        #[serde(default)]
        headers: Headers,
        /// Reply body.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping,

    /// Keepalive pong.
    #[serde(rename = "pong")]
    Pong,
}

impl Frame {
    /// Create a new Request frame.
    #[must_use]
    pub fn request(
        id: u64,
        subject: impl Into<String>,
        headers: Headers,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Frame::Request {
            id,
            subject: subject.into(),
            headers,
            payload: payload.into(),
        }
    }

    /// Create a Request frame from a message.
    #[must_use]
    pub fn from_message(id: u64, message: Message) -> Self {
        Frame::Request {
            id,
            subject: message.subject,
            headers: message.headers,
            payload: message.payload.to_vec(),
        }
    }

    /// Create a Reply frame from a reply outcome.
    #[must_use]
    pub fn reply(id: u64, reply: Reply) -> Self {
        let (headers, body) = reply.into_parts();
        Frame::Reply {
            id,
            headers,
            payload: body.to_vec(),
        }
    }

    /// Convert a Request frame into `(id, message)`.
    #[must_use]
    pub fn into_request(self) -> Option<(u64, Message)> {
        match self {
            Frame::Request {
                id,
                subject,
                headers,
                payload,
            } => Some((
                id,
                Message {
                    subject,
                    headers,
                    payload: Bytes::from(payload),
                },
            )),
            _ => None,
        }
    }

    /// Convert a Reply frame into `(id, reply)`.
    #[must_use]
    pub fn into_reply(self) -> Option<(u64, Reply)> {
        match self {
            Frame::Reply {
                id,
                headers,
                payload,
            } => Some((id, Reply::from_parts(headers, Bytes::from(payload)))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_message() {
        let message = Message::new("a.b", b"data".to_vec()).with_header("k", "v");
        let frame = Frame::from_message(3, message.clone());

        let (id, decoded) = frame.into_request().unwrap();
        assert_eq!(id, 3);
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_error_reply_frame() {
        let frame = Frame::reply(9, Reply::error("HandlerError", "boom"));
        match &frame {
            Frame::Reply { payload, .. } => assert!(payload.is_empty()),
            other => panic!("expected reply frame, got {:?}", other),
        }

        let (id, reply) = frame.into_reply().unwrap();
        assert_eq!(id, 9);
        assert_eq!(reply, Reply::error("HandlerError", "boom"));
    }

    #[test]
    fn test_into_reply_rejects_other_frames() {
        assert!(Frame::Ping.into_reply().is_none());
        assert!(Frame::Pong.into_request().is_none());
    }
}
