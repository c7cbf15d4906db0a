//! Transport abstraction traits.
//!
//! These traits define what the router consumes from a pub/sub substrate: a
//! live connection, one subject-addressed endpoint, a reply primitive and a
//! drain primitive.

use async_trait::async_trait;
use nsr_protocol::{Message, Reply};
use std::fmt;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has no live connection.
    #[error("Not connected")]
    NotConnected,

    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The transport is draining and accepts no new work.
    #[error("Transport is draining")]
    Draining,

    /// No endpoint is registered for the subject.
    #[error("No responders for subject: {0}")]
    NoResponders(String),

    /// Invalid endpoint subject.
    #[error("Invalid endpoint subject: {0}")]
    InvalidSubject(String),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] nsr_protocol::ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// A connection to the messaging substrate.
///
/// A transport hands out subject-addressed endpoints and can gracefully drain
/// itself on shutdown.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Register an endpoint receiving every message whose subject matches
    /// `subject` (wildcards allowed).
    async fn add_endpoint(&self, subject: &str) -> Result<Box<dyn Endpoint>, TransportError>;

    /// Stop accepting new work, let pending replies flush, then disconnect.
    async fn drain(&self) -> Result<(), TransportError>;

    /// Get the transport name (e.g., "memory", "tcp").
    fn name(&self) -> &'static str;

    /// Check if the connection is live.
    fn is_connected(&self) -> bool {
        true
    }
}

/// A registered endpoint yielding inbound requests.
#[async_trait]
pub trait Endpoint: Send {
    /// The subject pattern this endpoint was registered on.
    fn subject(&self) -> &str;

    /// Receive the next inbound request.
    ///
    /// Returns `None` once the endpoint is stopped or the transport drained.
    async fn recv(&mut self) -> Option<Inbound>;

    /// Unregister the endpoint. No further requests are accepted; requests
    /// already queued are still yielded by [`Endpoint::recv`] until it
    /// returns `None`.
    async fn stop(&mut self) -> Result<(), TransportError>;
}

/// Sends the single reply for one inbound request.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Deliver the reply to the original requester.
    async fn respond(&self, reply: Reply) -> Result<(), TransportError>;
}

/// An inbound request together with the means to answer it.
pub struct Inbound {
    /// The raw message.
    pub message: Message,
    responder: Box<dyn Responder>,
}

impl Inbound {
    /// Create a new inbound request.
    pub fn new(message: Message, responder: impl Responder + 'static) -> Self {
        Self {
            message,
            responder: Box::new(responder),
        }
    }

    /// Split into the message and its responder.
    #[must_use]
    pub fn into_parts(self) -> (Message, Box<dyn Responder>) {
        (self.message, self.responder)
    }

    /// Answer the request. Consumes the inbound so only one reply is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply cannot be delivered.
    pub async fn respond(self, reply: Reply) -> Result<(), TransportError> {
        self.responder.respond(reply).await
    }
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
