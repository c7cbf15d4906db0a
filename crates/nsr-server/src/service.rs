//! Service lifecycle.
//!
//! Binds the TCP transport, builds the router and serves until ctrl-c, then
//! stops the router gracefully.

use crate::config::Config;
use crate::metrics;
use crate::routes;
use anyhow::Result;
use nsr_core::{logger, Logger, Router, RouterError};
use nsr_transport::{TcpTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the service.
///
/// # Errors
///
/// Returns an error if the transport cannot bind or the router fails to
/// start or stop.
pub async fn run(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let transport = TcpTransport::bind(config.tcp_config()?).await?;
    let addr = transport.local_addr();

    let mut router = build_router(&config, Arc::new(transport))?;
    router.start().await?;
    info!("nsr listening on {}", addr);

    shutdown_signal().await;
    info!("Shutdown signal received, draining");

    router.stop().await?;
    Ok(())
}

/// Build a router with the default middleware and built-in routes.
///
/// # Errors
///
/// Returns an error if a route cannot be registered.
pub fn build_router(config: &Config, transport: Arc<dyn Transport>) -> Result<Router, RouterError> {
    let mut router = Router::with_config(config.router_config()).with_transport(transport);

    router.use_middleware(logger(Logger::fallback()))?;
    if config.metrics.enabled {
        router.use_middleware(metrics::metrics_middleware())?;
    }
    routes::register(&mut router)?;

    Ok(router)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c, shutting down");
    }
}
