//! Point-in-time status query.

use tonic::Request;
use tonic_health::pb::health_server::Health;
use tonic_health::pb::HealthCheckRequest;

use crate::backend::connector::BackendConnection;
use crate::error::ProxyError;
use crate::health::{ServingStatus, TargetService};
use crate::resilience::RequestContext;

/// Ask the backend once for the status of `service`.
///
/// Exactly one Check round trip per call; nothing is cached. The poll's
/// remaining time is forwarded as the request's grpc-timeout. Any error the
/// backend or the transport reports, including NOT_FOUND for an unknown
/// service, comes back as [`ProxyError::Backend`]. A failure that arrives once
/// the poll's deadline has passed is the client-side timeout firing and is
/// reported as [`ProxyError::DeadlineExceeded`].
pub async fn check_once(
    conn: &BackendConnection,
    service: &TargetService,
    ctx: &RequestContext,
) -> Result<ServingStatus, ProxyError> {
    let mut request = Request::new(HealthCheckRequest {
        service: service.as_str().to_string(),
    });
    if let Some(remaining) = ctx.remaining() {
        request.set_timeout(remaining);
    }

    let response = conn
        .health_client()
        .check(request)
        .await
        .map_err(|status| {
            if ctx.is_expired() {
                ProxyError::DeadlineExceeded
            } else {
                ProxyError::Backend(status)
            }
        })?
        .into_inner();

    let status = ServingStatus::from(response.status());
    tracing::trace!(service = %service, status = %status, "Check answered");
    Ok(status)
}

/// A health service living in the same process as the proxy.
///
/// Implemented for every generated `Health` server impl, so an application can
/// put the ALB endpoint straight in front of e.g.
/// `tonic_health::server::HealthService` without a network hop.
#[tonic::async_trait]
pub trait LocalHealth: Send + Sync + 'static {
    async fn check_local(&self, service: &TargetService) -> Result<ServingStatus, ProxyError>;
}

#[tonic::async_trait]
impl<H: Health> LocalHealth for H {
    async fn check_local(&self, service: &TargetService) -> Result<ServingStatus, ProxyError> {
        let request = Request::new(HealthCheckRequest {
            service: service.as_str().to_string(),
        });
        let response = Health::check(self, request)
            .await
            .map_err(ProxyError::Backend)?
            .into_inner();
        Ok(ServingStatus::from(response.status()))
    }
}
