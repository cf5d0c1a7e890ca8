//! Command-line and environment overrides.
//!
//! Precedence, lowest first: built-in defaults, TOML file, `PROXY_*`
//! environment variables, command-line flags. Clap resolves the last two;
//! only values that were actually supplied overwrite the file.

use std::path::PathBuf;
use clap::Parser;

use crate::config::loader::{default_config_path, read_config, ConfigError};
use crate::config::schema::{ProxyConfig, ProxyMode};
use crate::config::validation::validate_config;
use crate::health::TargetService;

#[derive(Debug, Parser)]
#[command(name = "alb-health-proxy")]
#[command(about = "ALB to gRPC health check proxy")]
#[command(long_about = "Listens on AWS.ALB/healthcheck and answers each poll from a \
grpc.health.v1.Health backend. Unlike the gRPC health protocol, a poll fails unless \
the target service (or the whole server when no service is given) reports SERVING.")]
pub struct Cli {
    /// Config file (defaults to $HOME/.proxy.toml when present)
    #[arg(short, long, env = "PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listener port
    #[arg(short, long, env = "PROXY_PORT")]
    pub port: Option<u16>,

    /// address:port of the grpc.health.v1.Health service
    #[arg(short, long, env = "PROXY_ADDRESS")]
    pub address: Option<String>,

    /// Service to check; empty checks the whole server
    #[arg(short, long, env = "PROXY_SERVICE")]
    pub service: Option<String>,

    /// Backend connection timeout in milliseconds
    #[arg(long = "timeout-ms", env = "PROXY_TIMEOUT_MS", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Use Watch instead of Check
    #[arg(short, long, env = "PROXY_WATCH")]
    pub watch: bool,
}

impl Cli {
    /// Merge file and overrides into a validated configuration.
    pub fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let path = self.config.clone().or_else(default_config_path);
        let mut config = match &path {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Overwrite the fields that were supplied on the command line or environment.
    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(address) = &self.address {
            config.backend.address = address.clone();
        }
        if let Some(service) = &self.service {
            config.backend.service = TargetService::new(service.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config.backend.connect_timeout_ms = ms;
        }
        if self.watch {
            config.mode = ProxyMode::Subscribe;
        }
    }
}
