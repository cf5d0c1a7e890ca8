//! Error types shared by the status translation core.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while answering a load balancer poll.
///
/// Connector and query errors are never retried internally; they travel
/// unchanged up to the proxy endpoint, which maps them onto a gRPC status.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The backend channel was not ready within the connect timeout.
    #[error("timeout: failed to connect to {address} within {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    /// The backend channel could not be established.
    #[error("failed to connect to {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The backend answered a health RPC with an error, or the call failed in transit.
    #[error("backend health check failed: {0}")]
    Backend(#[source] tonic::Status),

    /// The backend is reachable but does not report SERVING.
    #[error("service {service:?} is not available")]
    ServiceUnavailable { service: String },

    /// The poll's own deadline lapsed.
    #[error("poll deadline exceeded")]
    DeadlineExceeded,
}

impl ProxyError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::ConnectTimeout { .. } => "connect_timeout",
            ProxyError::ConnectFailed { .. } => "connect_failed",
            ProxyError::Backend(_) => "backend_error",
            ProxyError::ServiceUnavailable { .. } => "service_unavailable",
            ProxyError::DeadlineExceeded => "deadline_exceeded",
        }
    }

    /// Convert into the status returned to the load balancer.
    ///
    /// The cause never leaves the process: only the target service is named.
    pub fn into_status(self, service: &str) -> tonic::Status {
        match self {
            ProxyError::DeadlineExceeded => {
                tonic::Status::deadline_exceeded(format!("health check for service {service:?} timed out"))
            }
            _ => tonic::Status::unavailable(format!("service {service:?} is not available")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_unavailable_mapping_hides_cause() {
        let err = ProxyError::Backend(tonic::Status::not_found("unknown service orders"));
        let status = err.into_status("orders");
        assert_eq!(status.code(), Code::Unavailable);
        assert!(!status.message().contains("unknown service"));
    }

    #[test]
    fn test_deadline_mapping() {
        let status = ProxyError::DeadlineExceeded.into_status("");
        assert_eq!(status.code(), Code::DeadlineExceeded);
    }

    #[test]
    fn test_display_messages() {
        let err = ProxyError::ConnectTimeout {
            address: "localhost:50051".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(err.to_string(), "timeout: failed to connect to localhost:50051 within 1s");

        let err = ProxyError::ServiceUnavailable { service: "orders".into() };
        assert_eq!(err.to_string(), "service \"orders\" is not available");
        assert_eq!(err.kind(), "service_unavailable");
    }
}
