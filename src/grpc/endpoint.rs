//! Proxy endpoint invoked once per load balancer poll.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tonic::{Request, Response, Status};

use crate::backend::{check_once, BackendConnection, LocalHealth};
use crate::config::ProxyMode;
use crate::error::ProxyError;
use crate::grpc::proto::alb_server::Alb;
use crate::grpc::proto::{HealthCheckRequest, HealthCheckResponse};
use crate::health::{translate, StatusCell, TargetService};
use crate::observability::metrics;
use crate::resilience::RequestContext;

/// Where a poll gets its status from.
#[derive(Clone)]
enum StatusSource {
    /// One backend Check per poll over the shared connection.
    Query(BackendConnection),
    /// One Check per poll against a health service in this process.
    InProcess(Arc<dyn LocalHealth>),
    /// The cell kept current by the subscription task.
    Subscribe(StatusCell),
}

impl fmt::Debug for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSource::Query(conn) => f.debug_tuple("Query").field(conn).finish(),
            StatusSource::InProcess(_) => f.write_str("InProcess"),
            StatusSource::Subscribe(cell) => f.debug_tuple("Subscribe").field(cell).finish(),
        }
    }
}

/// Answers `AWS.ALB/healthcheck` from the backend's health status.
#[derive(Debug, Clone)]
pub struct HealthcheckProxy {
    service: TargetService,
    source: StatusSource,
    request_timeout: Option<Duration>,
}

impl HealthcheckProxy {
    /// Query mode: every poll costs one backend round trip.
    pub fn query(conn: BackendConnection, service: TargetService) -> Self {
        Self {
            service,
            source: StatusSource::Query(conn),
            request_timeout: None,
        }
    }

    /// Query mode against a health service embedded in the same process,
    /// such as the one behind `tonic_health::server::health_reporter()`.
    pub fn in_process<H: LocalHealth>(health: H, service: TargetService) -> Self {
        Self {
            service,
            source: StatusSource::InProcess(Arc::new(health)),
            request_timeout: None,
        }
    }

    /// Subscribe mode: polls only read the cached status.
    pub fn subscribe(cell: StatusCell, service: TargetService) -> Self {
        Self {
            service,
            source: StatusSource::Subscribe(cell),
            request_timeout: None,
        }
    }

    /// Cap every poll at `timeout`, on top of the caller's own grpc-timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn mode(&self) -> ProxyMode {
        match self.source {
            StatusSource::Query(_) | StatusSource::InProcess(_) => ProxyMode::Query,
            StatusSource::Subscribe(_) => ProxyMode::Subscribe,
        }
    }

    pub fn service(&self) -> &TargetService {
        &self.service
    }

    /// Answer one poll. `Ok(())` means the load balancer should see success.
    ///
    /// An already-expired deadline fails before the backend or the cell is touched.
    pub async fn poll(&self, ctx: &RequestContext) -> Result<(), ProxyError> {
        if ctx.is_expired() {
            return Err(ProxyError::DeadlineExceeded);
        }

        let status = match &self.source {
            StatusSource::Query(conn) => ctx.bound(check_once(conn, &self.service, ctx)).await?,
            StatusSource::InProcess(health) => ctx.bound(health.check_local(&self.service)).await?,
            StatusSource::Subscribe(cell) => cell.load(),
        };

        translate(status, &self.service)
    }
}

#[tonic::async_trait]
impl Alb for HealthcheckProxy {
    async fn healthcheck(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let start = Instant::now();
        let ctx = RequestContext::from_metadata(request.metadata(), start, self.request_timeout);
        let mode = self.mode().as_str();

        let result = self.poll(&ctx).await;
        metrics::record_poll(mode, &result, start.into_std());

        match result {
            Ok(()) => {
                tracing::debug!(mode, service = %self.service, "Health check passed");
                Ok(Response::new(HealthCheckResponse {}))
            }
            Err(e) => {
                tracing::warn!(
                    mode,
                    service = %self.service,
                    kind = e.kind(),
                    error = %e,
                    "Health check failed"
                );
                Err(e.into_status(self.service.as_str()))
            }
        }
    }
}
