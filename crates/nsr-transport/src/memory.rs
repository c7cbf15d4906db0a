//! In-process transport.
//!
//! Requesters and endpoints live in the same process and exchange messages
//! over tokio channels. Useful for tests, benchmarks and embedding.

use crate::registry::{EndpointRegistry, DEFAULT_ENDPOINT_CAPACITY};
use crate::traits::{Endpoint, Inbound, Responder, Transport, TransportError};
use async_trait::async_trait;
use nsr_protocol::{Message, Reply};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

/// Transport backed by in-process channels.
#[derive(Clone)]
pub struct MemoryTransport {
    registry: Arc<EndpointRegistry>,
    connected: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Create a new connected memory transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ENDPOINT_CAPACITY)
    }

    /// Create a memory transport buffering up to `capacity` requests per endpoint.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: EndpointRegistry::new(capacity),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Send a request and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoResponders`] if no endpoint matches the
    /// subject, [`TransportError::Draining`] once the transport is draining,
    /// and [`TransportError::ConnectionClosed`] if the request was dropped
    /// without a reply.
    pub async fn request(&self, message: Message) -> Result<Reply, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        let responder = MemoryResponder {
            sender: Mutex::new(Some(tx)),
        };
        self.registry.route(Inbound::new(message, responder)).await?;

        rx.await.map_err(|_| TransportError::ConnectionClosed)
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn add_endpoint(&self, subject: &str) -> Result<Box<dyn Endpoint>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let endpoint = self.registry.register(subject)?;
        Ok(Box::new(endpoint))
    }

    async fn drain(&self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.registry.close();
        info!("Memory transport drained");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Replies to an in-process requester through a oneshot channel.
struct MemoryResponder {
    sender: Mutex<Option<oneshot::Sender<Reply>>>,
}

#[async_trait]
impl Responder for MemoryResponder {
    async fn respond(&self, reply: Reply) -> Result<(), TransportError> {
        let sender = self
            .sender
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::SendFailed("reply already sent".into()))?;

        sender.send(reply).map_err(|_| {
            debug!("Requester went away before the reply");
            TransportError::ConnectionClosed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsr_protocol::Headers;

    #[tokio::test]
    async fn test_request_reply() {
        let transport = MemoryTransport::new();
        let mut endpoint = transport.add_endpoint("svc.>").await.unwrap();

        let server = tokio::spawn(async move {
            let inbound = endpoint.recv().await.unwrap();
            let body = inbound.message.payload.clone();
            inbound
                .respond(Reply::success(Headers::new(), body))
                .await
                .unwrap();
        });

        let reply = transport
            .request(Message::new("svc.echo", b"ping".to_vec()))
            .await
            .unwrap();
        assert_eq!(reply.body(), b"ping");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_responders() {
        let transport = MemoryTransport::new();
        let _endpoint = transport.add_endpoint("svc.>").await.unwrap();

        let result = transport.request(Message::new("other.echo", Vec::new())).await;
        assert!(matches!(result, Err(TransportError::NoResponders(_))));
    }

    #[tokio::test]
    async fn test_stopped_endpoint_receives_nothing() {
        let transport = MemoryTransport::new();
        let mut endpoint = transport.add_endpoint("svc.>").await.unwrap();
        endpoint.stop().await.unwrap();

        assert_eq!(transport.endpoint_count(), 0);
        assert!(endpoint.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_drain_refuses_new_work() {
        let transport = MemoryTransport::new();
        let mut endpoint = transport.add_endpoint("svc.>").await.unwrap();

        transport.drain().await.unwrap();
        assert!(!transport.is_connected());
        assert!(endpoint.recv().await.is_none());
        assert!(matches!(
            transport.request(Message::new("svc.echo", Vec::new())).await,
            Err(TransportError::NotConnected)
        ));
        assert!(transport.drain().await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_inbound_closes_request() {
        let transport = MemoryTransport::new();
        let mut endpoint = transport.add_endpoint("svc.>").await.unwrap();

        let server = tokio::spawn(async move {
            let inbound = endpoint.recv().await.unwrap();
            drop(inbound);
        });

        let result = transport.request(Message::new("svc.echo", Vec::new())).await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
        server.await.unwrap();
    }
}
