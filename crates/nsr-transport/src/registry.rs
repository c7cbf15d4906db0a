//! Endpoint registry shared by the in-process and TCP transports.

use crate::traits::{Endpoint, Inbound, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use nsr_protocol::subject::{self, FULL_WILDCARD};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default number of inbound requests buffered per endpoint.
pub const DEFAULT_ENDPOINT_CAPACITY: usize = 1024;

struct Registration {
    subject: String,
    sender: mpsc::Sender<Inbound>,
}

/// Registered endpoints indexed by registration order.
pub(crate) struct EndpointRegistry {
    endpoints: DashMap<u64, Registration>,
    next_id: AtomicU64,
    draining: AtomicBool,
    capacity: usize,
}

fn validate_endpoint_subject(pattern: &str) -> Result<(), TransportError> {
    let tokens: Vec<&str> = subject::tokens(pattern).collect();
    let last = tokens.len() - 1;
    for (position, token) in tokens.iter().enumerate() {
        if !subject::is_valid_token(token) || (*token == FULL_WILDCARD && position != last) {
            return Err(TransportError::InvalidSubject(pattern.to_string()));
        }
    }
    Ok(())
}

impl EndpointRegistry {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            endpoints: DashMap::new(),
            next_id: AtomicU64::new(0),
            draining: AtomicBool::new(false),
            capacity: capacity.max(1),
        })
    }

    pub(crate) fn register(
        self: &Arc<Self>,
        subject: &str,
    ) -> Result<RegistryEndpoint, TransportError> {
        if self.is_draining() {
            return Err(TransportError::Draining);
        }
        validate_endpoint_subject(subject)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.endpoints.insert(
            id,
            Registration {
                subject: subject.to_string(),
                sender,
            },
        );
        debug!(endpoint = id, subject = %subject, "Endpoint registered");

        Ok(RegistryEndpoint {
            id,
            subject: subject.to_string(),
            receiver,
            registry: Arc::clone(self),
        })
    }

    /// Deliver an inbound request to the oldest endpoint matching its subject.
    pub(crate) async fn route(&self, inbound: Inbound) -> Result<(), TransportError> {
        if self.is_draining() {
            return Err(TransportError::Draining);
        }

        let target = self
            .endpoints
            .iter()
            .filter(|entry| subject::matches(&entry.subject, &inbound.message.subject))
            .min_by_key(|entry| *entry.key())
            .map(|entry| entry.sender.clone());

        let Some(sender) = target else {
            return Err(TransportError::NoResponders(inbound.message.subject));
        };

        trace!(subject = %inbound.message.subject, "Routing inbound request");
        sender
            .send(inbound)
            .await
            .map_err(|e| TransportError::NoResponders(e.0.message.subject))
    }

    pub(crate) fn remove(&self, id: u64) {
        if self.endpoints.remove(&id).is_some() {
            debug!(endpoint = id, "Endpoint removed");
        }
    }

    /// Refuse new work and drop every endpoint sender.
    pub(crate) fn close(&self) {
        self.draining.store(true, Ordering::SeqCst);
        self.endpoints.clear();
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.endpoints.len()
    }
}

/// Endpoint handed out by registry-backed transports.
pub(crate) struct RegistryEndpoint {
    id: u64,
    subject: String,
    receiver: mpsc::Receiver<Inbound>,
    registry: Arc<EndpointRegistry>,
}

#[async_trait]
impl Endpoint for RegistryEndpoint {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn recv(&mut self) -> Option<Inbound> {
        self.receiver.recv().await
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        self.registry.remove(self.id);
        self.receiver.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_subject_validation() {
        assert!(validate_endpoint_subject("svc.>").is_ok());
        assert!(validate_endpoint_subject("svc.*.get").is_ok());
        assert!(validate_endpoint_subject(">").is_ok());
        assert!(validate_endpoint_subject("").is_err());
        assert!(validate_endpoint_subject("svc..get").is_err());
        assert!(validate_endpoint_subject("svc.>.get").is_err());
    }

    #[test]
    fn test_register_after_close() {
        let registry = EndpointRegistry::new(8);
        let _endpoint = registry.register("a.>").unwrap();
        assert_eq!(registry.len(), 1);

        registry.close();
        assert_eq!(registry.len(), 0);
        assert!(matches!(
            registry.register("a.>"),
            Err(TransportError::Draining)
        ));
    }
}
