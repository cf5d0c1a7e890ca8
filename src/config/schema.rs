//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so a minimal (or empty) file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::TargetService;

/// Root configuration for the health check proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Where the load balancer polls us.
    pub listener: ListenerConfig,

    /// The grpc.health.v1 backend we translate for.
    pub backend: BackendConfig,

    /// How polls are answered.
    pub mode: ProxyMode,

    /// Resubscription policy for subscribe mode.
    pub retries: RetryConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// How each poll is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// One backend Check per poll.
    #[default]
    Query,
    /// Polls read the status cached from a long-lived Watch stream.
    Subscribe,
}

impl ProxyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMode::Query => "query",
            ProxyMode::Subscribe => "subscribe",
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Listener port.
    pub port: u16,
}

impl ListenerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50052,
        }
    }
}

/// Backend health service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Address of the grpc.health.v1.Health service (e.g., "localhost:50051").
    pub address: String,

    /// Sub-service to check; empty checks the whole server.
    pub service: TargetService,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Upper bound for a single poll in milliseconds. 0 disables it and
    /// leaves only the caller's grpc-timeout.
    pub request_timeout_ms: u64,
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "localhost:50051".to_string(),
            service: TargetService::default(),
            connect_timeout_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

/// Resubscription configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Resubscribe after the Watch stream ends.
    pub enabled: bool,

    /// Consecutive failed attempts before giving up (0 = never give up).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 0,
            base_delay_ms: 250,
            max_delay_ms: 30_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive, used when RUST_LOG is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "alb_health_proxy=info,tonic=warn".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address(), "0.0.0.0:50052");
        assert_eq!(config.backend.address, "localhost:50051");
        assert!(config.backend.service.is_whole_backend());
        assert_eq!(config.backend.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.mode, ProxyMode::Query);
    }

    #[test]
    fn test_full_file() {
        let config: ProxyConfig = toml::from_str(
            r#"
            mode = "subscribe"

            [listener]
            port = 8443

            [backend]
            address = "10.0.0.5:50051"
            service = "orders"
            request_timeout_ms = 0

            [retries]
            max_attempts = 5

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, ProxyMode::Subscribe);
        assert_eq!(config.listener.bind_address(), "0.0.0.0:8443");
        assert_eq!(config.backend.service.as_str(), "orders");
        assert_eq!(config.backend.request_timeout(), None);
        assert_eq!(config.retries.max_attempts, 5);
        assert!(config.retries.enabled);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
