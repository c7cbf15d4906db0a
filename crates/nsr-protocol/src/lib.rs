//! # nsr-protocol
//!
//! Wire-level types shared by the nsr subject router and its transports.
//!
//! - **Subject** - dot-delimited subject grammar and wildcard tokens
//! - **Headers** - ordered multimap with append semantics
//! - **Message** / **Reply** - the inbound request and the outbound outcome
//! - **Frame** / **codec** - length-prefixed MessagePack framing used by
//!   byte-stream transports
//!
//! ## Example
//!
//! ```rust
//! use nsr_protocol::{codec, Frame, Headers};
//!
//! let mut headers = Headers::new();
//! headers.append("trace", "abc");
//!
//! let frame = Frame::request(7, "orders.create", headers, b"{}".to_vec());
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;
pub mod headers;
pub mod message;
pub mod subject;

pub use codec::{decode, encode, ProtocolError};
pub use frames::Frame;
pub use headers::Headers;
pub use message::{Message, Reply};
