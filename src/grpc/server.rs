//! gRPC server setup.
//!
//! # Responsibilities
//! - Register the `AWS.ALB` service
//! - Serve on an already-bound listener
//! - Drain in-flight polls on shutdown

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::grpc::endpoint::HealthcheckProxy;
use crate::grpc::proto::alb_server::AlbServer;

/// gRPC server for the health check proxy.
pub struct ProxyServer {
    proxy: HealthcheckProxy,
}

impl ProxyServer {
    pub fn new(proxy: HealthcheckProxy) -> Self {
        Self { proxy }
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), tonic::transport::Error> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                mode = self.proxy.mode().as_str(),
                service = %self.proxy.service(),
                "gRPC server starting"
            );
        }

        Server::builder()
            .add_service(AlbServer::new(self.proxy))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("gRPC server stopped");
        Ok(())
    }
}
