//! # nsr-core
//!
//! Core routing for the nsr subject router.
//!
//! This crate provides:
//! - **Subject tree** - wildcard-aware pattern storage with literal > `*` > `>`
//!   matching priority
//! - **Middleware** - handler wrappers, first registered outermost
//! - **Dispatch** - one reply per request, handler errors first
//! - **Router** - endpoint lifecycle over any [`nsr_transport::Transport`]
//!
//! ```rust,ignore
//! use nsr_core::{handler, logger, Logger, Router};
//! use nsr_transport::MemoryTransport;
//! use std::sync::Arc;
//!
//! let mut router = Router::new().with_transport(Arc::new(MemoryTransport::new()));
//! router.use_middleware(logger(Logger::fallback()))?;
//! router.path("orders.*.get", handler(|response, request| {
//!     response.write(request.subject.as_bytes());
//!     Ok(())
//! }))?;
//! router.start().await?;
//! ```

pub mod dispatch;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod request;
pub mod router;
pub mod tree;

pub use dispatch::{dispatch, not_found, resolve, HANDLER_ERROR_CODE, NOT_FOUND_CODE};
pub use handler::{handler, BoxError, Handler, HandlerResult};
pub use logging::Logger;
pub use middleware::{compose, logger, middleware, Middleware};
pub use request::{ExplicitError, Request, Response, UNKNOWN_DESCRIPTION};
pub use router::{Router, RouterConfig, RouterError, RouterState};
pub use tree::{RegistrationError, Route, SubjectTree};
