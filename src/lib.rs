//! ALB to gRPC health check proxy library.

pub mod backend;
pub mod config;
pub mod error;
pub mod grpc;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use grpc::HealthcheckProxy;
pub use lifecycle::{ProxyRuntime, Shutdown};
