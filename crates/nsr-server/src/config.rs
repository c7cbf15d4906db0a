//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (NSR_HOST, NSR_PORT, NSR_BASE_SUBJECT)
//! - TOML configuration file
//! - `--config <path>` on the command line

use anyhow::{bail, Context, Result};
use nsr_core::RouterConfig;
use nsr_protocol::codec::MAX_FRAME_SIZE;
use nsr_transport::{TcpConfig, DEFAULT_ENDPOINT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Router configuration.
    #[serde(default)]
    pub router: RouterSection,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSection {
    /// Subject the service endpoint is registered on.
    #[serde(default = "default_base_subject")]
    pub base_subject: String,

    /// Time allowed for in-flight requests on shutdown, in milliseconds.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum frame size in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Requests buffered per endpoint before connections apply backpressure.
    #[serde(default = "default_endpoint_capacity")]
    pub endpoint_capacity: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("NSR_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("NSR_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4222)
}

fn default_base_subject() -> String {
    std::env::var("NSR_BASE_SUBJECT").unwrap_or_else(|_| ">".to_string())
}

fn default_drain_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_max_frame_size() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_endpoint_capacity() -> usize {
    DEFAULT_ENDPOINT_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            router: RouterSection::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            base_subject: default_base_subject(),
            drain_timeout_ms: default_drain_timeout(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            endpoint_capacity: default_endpoint_capacity(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = ["nsr.toml", "/etc/nsr/nsr.toml", "~/.config/nsr/nsr.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check limits the transport cannot honor.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_frame_size == 0 || self.limits.max_frame_size > MAX_FRAME_SIZE {
            bail!(
                "limits.max_frame_size must be between 1 and {} bytes, got {}",
                MAX_FRAME_SIZE,
                self.limits.max_frame_size
            );
        }
        if self.limits.endpoint_capacity == 0 {
            bail!("limits.endpoint_capacity must be positive");
        }
        if self.router.base_subject.is_empty() {
            bail!("router.base_subject must not be empty");
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}:{}", self.host, self.port))
    }

    /// Router settings.
    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            base_subject: self.router.base_subject.clone(),
            drain_timeout: Duration::from_millis(self.router.drain_timeout_ms),
        }
    }

    /// TCP transport settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid.
    pub fn tcp_config(&self) -> Result<TcpConfig> {
        Ok(TcpConfig {
            bind_addr: self.bind_addr()?,
            max_frame_size: self.limits.max_frame_size,
            endpoint_capacity: self.limits.endpoint_capacity,
        })
    }
}
