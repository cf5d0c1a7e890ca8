//! Backend channel establishment.

use std::time::{Duration, Instant};

use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::health_client::HealthClient;

use crate::error::ProxyError;

/// Long-lived channel to the backend health service.
///
/// Cloning is cheap and every clone multiplexes onto the same HTTP/2
/// connection, so concurrent polls can share one instance.
#[derive(Debug, Clone)]
pub struct BackendConnection {
    address: String,
    channel: Channel,
}

impl BackendConnection {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// A health client bound to the shared channel.
    pub fn health_client(&self) -> HealthClient<Channel> {
        HealthClient::new(self.channel.clone())
    }
}

/// Connect to `address`, waiting at most `timeout` for the channel to become ready.
///
/// Addresses without a scheme are dialed over plaintext HTTP/2.
pub async fn connect(address: &str, timeout: Duration) -> Result<BackendConnection, ProxyError> {
    let uri = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let endpoint = Endpoint::from_shared(uri)
        .map_err(|source| ProxyError::ConnectFailed {
            address: address.to_string(),
            source,
        })?
        // Also bounds the channel's own reconnects after startup.
        .connect_timeout(timeout)
        .tcp_nodelay(true);

    tracing::debug!(address = %address, timeout = ?timeout, "Connecting to backend");

    let started = Instant::now();
    let channel = match tokio::time::timeout(timeout, endpoint.connect()).await {
        Ok(Ok(channel)) => channel,
        // The endpoint's connect_timeout can fire just ahead of ours.
        Ok(Err(_)) if started.elapsed() >= timeout => {
            return Err(ProxyError::ConnectTimeout {
                address: address.to_string(),
                timeout,
            })
        }
        Ok(Err(source)) => {
            return Err(ProxyError::ConnectFailed {
                address: address.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(ProxyError::ConnectTimeout {
                address: address.to_string(),
                timeout,
            })
        }
    };

    tracing::info!(
        address = %address,
        elapsed = ?started.elapsed(),
        "Connected to backend"
    );

    Ok(BackendConnection {
        address: address.to_string(),
        channel,
    })
}
