//! # nsr
//!
//! Subject router service listening on the nsr TCP transport.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! nsr
//!
//! # Run with a specific config file
//! nsr --config /path/to/nsr.toml
//!
//! # Run with environment variables
//! NSR_PORT=4333 NSR_HOST=0.0.0.0 NSR_BASE_SUBJECT="svc.>" nsr
//! ```

mod config;
mod metrics;
mod routes;
mod service;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nsr=info,nsr_core=info,nsr_transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match config_path_arg(std::env::args()) {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load()?,
    };
    config.validate()?;

    tracing::info!(
        "Starting nsr on {}:{} (base subject {})",
        config.host,
        config.port,
        config.router.base_subject
    );

    if config.metrics.enabled {
        metrics::init_metrics();
    }

    service::run(config).await
}

/// Value following `--config`, if any.
fn config_path_arg(args: impl IntoIterator<Item = String>) -> Option<String> {
    let mut args = args.into_iter().skip_while(|arg| arg != "--config");
    args.next()?;
    args.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_path_arg() {
        assert_eq!(
            config_path_arg(args(&["nsr", "--config", "/tmp/nsr.toml"])),
            Some("/tmp/nsr.toml".to_string())
        );
        assert_eq!(config_path_arg(args(&["nsr"])), None);
        assert_eq!(config_path_arg(args(&["nsr", "--config"])), None);
    }
}
