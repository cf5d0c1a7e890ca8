//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect to the backend (fatal on failure)
//! - Bind the listener (fatal on failure)
//! - Open the first subscription in subscribe mode (fatal on failure)
//! - Serve polls until shutdown, then wait for the subscription task
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - The backend must be reachable before the listener accepts polls

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::backend::{connect, Subscription, SubscriptionHandle};
use crate::config::{ConfigError, ProxyConfig, ProxyMode};
use crate::error::ProxyError;
use crate::grpc::{HealthcheckProxy, ProxyServer};
use crate::lifecycle::shutdown::Shutdown;

/// Fatal errors that terminate the process.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("failed to listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serve: {0}")]
    Serve(#[from] tonic::transport::Error),
}

/// A started proxy: backend connected, listener bound, ready to serve.
pub struct ProxyRuntime {
    listener: TcpListener,
    proxy: HealthcheckProxy,
    subscription: Option<SubscriptionHandle>,
}

impl ProxyRuntime {
    /// Bring up every component the configured mode needs.
    pub async fn start(config: &ProxyConfig, shutdown: &Shutdown) -> Result<Self, StartupError> {
        tracing::info!(
            address = %config.backend.address,
            service = %config.backend.service,
            mode = config.mode.as_str(),
            "Starting health check proxy"
        );

        let conn = connect(&config.backend.address, config.backend.connect_timeout()).await?;

        let address = config.listener.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;

        let service = config.backend.service.clone();
        let (proxy, subscription) = match config.mode {
            ProxyMode::Query => (HealthcheckProxy::query(conn, service), None),
            ProxyMode::Subscribe => {
                let handle = Subscription::new(conn, service.clone(), config.retries.clone())
                    .start(shutdown.subscribe())
                    .await?;
                (HealthcheckProxy::subscribe(handle.cell(), service), Some(handle))
            }
        };

        Ok(Self {
            listener,
            proxy: proxy.with_request_timeout(config.backend.request_timeout()),
            subscription,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The running subscription, in subscribe mode.
    pub fn subscription(&self) -> Option<&SubscriptionHandle> {
        self.subscription.as_ref()
    }

    /// Serve polls until `shutdown` fires.
    pub async fn serve(self, shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
        ProxyServer::new(self.proxy).run(self.listener, shutdown).await?;

        if let Some(subscription) = self.subscription {
            subscription.join().await;
        }
        Ok(())
    }
}

/// Start and serve until shutdown.
pub async fn run(config: &ProxyConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let server_shutdown = shutdown.subscribe();
    let runtime = ProxyRuntime::start(config, shutdown).await?;
    runtime.serve(server_shutdown).await
}
