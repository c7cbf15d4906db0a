//! Subject router.
//!
//! The router owns the subject tree, the middleware list and the lifecycle
//! of one transport endpoint. Routes and middleware are registered while the
//! router is [`RouterState::Created`]; [`Router::start`] freezes them into a
//! shared route table and starts serving.

use crate::dispatch::{dispatch, not_found};
use crate::handler::Handler;
use crate::logging::Logger;
use crate::middleware::{compose, Middleware};
use crate::tree::{RegistrationError, SubjectTree};
use nsr_transport::{Endpoint, Inbound, Transport, TransportError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, trace, warn};

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The router is missing required configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A pattern could not be registered.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// The operation is not allowed in the current lifecycle state.
    #[error("Cannot {operation} while the router is {state}")]
    InvalidState {
        operation: &'static str,
        state: RouterState,
    },

    /// The transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// Constructed; routes and middleware may be registered.
    Created,
    /// Serving requests.
    Running,
    /// Terminal.
    Stopped,
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouterState::Created => "created",
            RouterState::Running => "running",
            RouterState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Subject the router's endpoint is registered on.
    pub base_subject: String,
    /// Upper bound on waiting for in-flight requests during stop.
    pub drain_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_subject: ">".to_string(),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Handlers with middleware applied, shared by every request task.
struct RouteTable {
    tree: SubjectTree<Handler>,
    fallback: Handler,
}

impl RouteTable {
    fn resolve(&self, subject: &str) -> &Handler {
        match self.tree.get(subject) {
            Some(route) => {
                trace!(subject = %subject, pattern = %route.pattern, "Route matched");
                route.value
            }
            None => {
                debug!(subject = %subject, "No route matched");
                &self.fallback
            }
        }
    }
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<(), TransportError>>,
}

/// Routes inbound messages on one endpoint to subject-pattern handlers.
pub struct Router {
    tree: SubjectTree<Handler>,
    middlewares: Vec<Middleware>,
    default_handler: Option<Handler>,
    transport: Option<Arc<dyn Transport>>,
    config: RouterConfig,
    logger: Logger,
    state: RouterState,
    running: Option<Running>,
}

impl Router {
    /// Create a new router with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a new router with custom configuration.
    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            tree: SubjectTree::new(),
            middlewares: Vec::new(),
            default_handler: None,
            transport: None,
            config,
            logger: Logger::fallback(),
            state: RouterState::Created,
            running: None,
        }
    }

    /// Set the transport connection.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the logging capability. Defaults to [`Logger::fallback`].
    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Set the handler used when no pattern matches.
    #[must_use]
    pub fn with_default_handler(mut self, handler: Handler) -> Self {
        self.default_handler = Some(handler);
        self
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the logger.
    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Get the lifecycle state.
    #[must_use]
    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Registered patterns in lexical order.
    #[must_use]
    pub fn routes(&self) -> Vec<&str> {
        self.tree.patterns()
    }

    /// Append a middleware. The first registered runs outermost.
    ///
    /// # Errors
    ///
    /// Returns an error unless the router is still [`RouterState::Created`].
    pub fn use_middleware(&mut self, middleware: Middleware) -> Result<(), RouterError> {
        self.ensure_created("add middleware")?;
        self.middlewares.push(middleware);
        Ok(())
    }

    /// Bind `handler` to `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is malformed or already bound, or if
    /// the router has already been started.
    pub fn path(&mut self, pattern: &str, handler: Handler) -> Result<(), RouterError> {
        self.ensure_created("add a path")?;
        self.tree.add_path(pattern, handler)?;
        self.logger
            .in_scope(|| debug!(pattern = %pattern, "Path registered"));
        Ok(())
    }

    /// Register the endpoint and start serving.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Configuration`] if no transport is configured,
    /// and [`RouterError::Transport`] if the transport is disconnected or
    /// refuses the endpoint. The router stays [`RouterState::Created`] on
    /// error.
    pub async fn start(&mut self) -> Result<(), RouterError> {
        self.ensure_created("start")?;

        let transport = self.transport.clone().ok_or_else(|| {
            RouterError::Configuration("no transport connection configured".to_string())
        })?;
        if !transport.is_connected() {
            return Err(TransportError::NotConnected.into());
        }

        let table = Arc::new(self.build_table());
        let endpoint = transport.add_endpoint(&self.config.base_subject).await?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let serve_loop = serve(endpoint, table, shutdown_rx, self.config.drain_timeout);
        let task = tokio::spawn(self.logger.instrument(serve_loop));

        self.running = Some(Running { shutdown, task });
        self.state = RouterState::Running;

        self.logger.in_scope(|| {
            info!(
                subject = %self.config.base_subject,
                transport = transport.name(),
                routes = self.tree.len(),
                middlewares = self.middlewares.len(),
                "Router started"
            );
            debug!(patterns = ?self.tree.patterns(), "Routes");
        });
        Ok(())
    }

    /// Stop serving and drain the transport.
    ///
    /// The endpoint is released first so no new request is dispatched, then
    /// in-flight requests are awaited for at most
    /// [`RouterConfig::drain_timeout`], then the transport is drained.
    /// Calling `stop` on a router that never started, or twice, is fine.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Transport`] if releasing the endpoint or
    /// draining the transport fails. The router is stopped either way.
    pub async fn stop(&mut self) -> Result<(), RouterError> {
        if self.state == RouterState::Stopped {
            return Ok(());
        }

        let mut result = Ok(());

        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            result = match running.task.await {
                Ok(served) => served.map_err(RouterError::from),
                Err(e) => Err(RouterError::Internal(format!("serve loop failed: {}", e))),
            };
        }

        if let Some(transport) = &self.transport {
            let drained = transport.drain().await.map_err(RouterError::from);
            if result.is_ok() {
                result = drained;
            }
        }

        self.state = RouterState::Stopped;
        self.logger.in_scope(|| match &result {
            Ok(()) => info!("Router stopped"),
            Err(e) => warn!(error = %e, "Router stopped with error"),
        });
        result
    }

    fn ensure_created(&self, operation: &'static str) -> Result<(), RouterError> {
        if self.state == RouterState::Created {
            Ok(())
        } else {
            Err(RouterError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn build_table(&self) -> RouteTable {
        let tree = self
            .tree
            .map_values(|_, handler| compose(&self.middlewares, Arc::clone(handler)));
        let fallback = compose(
            &self.middlewares,
            self.default_handler.clone().unwrap_or_else(not_found),
        );
        RouteTable { tree, fallback }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

async fn serve(
    mut endpoint: Box<dyn Endpoint>,
    table: Arc<RouteTable>,
    mut shutdown: oneshot::Receiver<()>,
    drain_timeout: Duration,
) -> Result<(), TransportError> {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Request task failed");
                }
            }

            inbound = endpoint.recv() => match inbound {
                Some(inbound) => {
                    in_flight.spawn(
                        handle(Arc::clone(&table), inbound).with_current_subscriber(),
                    );
                }
                None => {
                    debug!(subject = %endpoint.subject(), "Endpoint closed");
                    break;
                }
            }
        }
    }

    let stopped = endpoint.stop().await;

    // Requests queued before the endpoint closed still get a reply.
    let mut queued = 0usize;
    while let Some(inbound) = endpoint.recv().await {
        in_flight.spawn(handle(Arc::clone(&table), inbound).with_current_subscriber());
        queued += 1;
    }
    if queued > 0 {
        debug!(queued, "Dispatching requests queued before stop");
    }

    debug!(in_flight = in_flight.len(), "Waiting for in-flight requests");
    let drained = tokio::time::timeout(drain_timeout, async {
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Request task failed");
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = in_flight.len(),
            "Drain timeout elapsed, aborting in-flight requests"
        );
        in_flight.abort_all();
    }

    stopped
}

async fn handle(table: Arc<RouteTable>, inbound: Inbound) {
    let (message, responder) = inbound.into_parts();
    let handler = Arc::clone(table.resolve(&message.subject));
    let reply = dispatch(&handler, message);

    if let Err(e) = responder.respond(reply).await {
        warn!(error = %e, "Failed to send reply");
    }
}
