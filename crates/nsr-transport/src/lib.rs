//! # nsr-transport
//!
//! Transport abstraction layer for the nsr subject router.
//!
//! The router only needs four things from a messaging substrate: a live
//! connection, one subject-addressed endpoint, a reply primitive and a drain
//! primitive. These are the [`Transport`], [`Endpoint`] and [`Responder`]
//! traits. Two implementations ship with the crate:
//!
//! - **Memory** - in-process channels, for tests and embedding
//! - **TCP** - length-prefixed MessagePack frames over TCP (feature `tcp`)
//!
//! ```rust,ignore
//! use nsr_transport::{Endpoint, Transport};
//!
//! async fn serve(transport: &dyn Transport) {
//!     let mut endpoint = transport.add_endpoint("svc.>").await.unwrap();
//!     while let Some(inbound) = endpoint.recv().await {
//!         // Dispatch and reply
//!     }
//! }
//! ```

pub mod memory;
mod registry;
pub mod traits;

#[cfg(feature = "tcp")]
pub mod tcp;

pub use memory::MemoryTransport;
pub use registry::DEFAULT_ENDPOINT_CAPACITY;
pub use traits::{Endpoint, Inbound, Responder, Transport, TransportError};

#[cfg(feature = "tcp")]
pub use tcp::{TcpClient, TcpConfig, TcpTransport};
