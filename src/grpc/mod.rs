//! Load-balancer-facing gRPC surface.
//!
//! # Responsibilities
//! - Generated `AWS.ALB` service types (proto/alb.proto)
//! - The poll handler translating backend status into pass/fail
//! - Hosting the handler on a bound listener until shutdown

pub mod endpoint;
pub mod server;

/// Generated types for the `AWS.ALB` health check service.
pub mod proto {
    tonic::include_proto!("aws");
}

pub use endpoint::HealthcheckProxy;
pub use server::ProxyServer;
