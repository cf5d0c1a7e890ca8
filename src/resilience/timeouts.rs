//! Poll deadlines.
//!
//! # Responsibilities
//! - Parse the inbound `grpc-timeout` header
//! - Combine it with the configured request timeout
//! - Bound backend calls by the resulting deadline
//!
//! A deadline that has already passed short-circuits the poll before any
//! backend work starts.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tonic::metadata::MetadataMap;

use crate::error::ProxyError;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Headroom kept under the caller's `grpc-timeout`.
///
/// The server drops a handler once the caller's timeout lapses, so the poll
/// must give up first to send back DEADLINE_EXCEEDED and record the failure.
/// Capped at half the caller's timeout.
const CALLER_DEADLINE_MARGIN: Duration = Duration::from_millis(50);

/// Per-poll context handed to the proxy endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no deadline.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline) }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Build the context for an inbound request received at `received`.
    ///
    /// The earlier of the caller's `grpc-timeout` (less a small margin) and
    /// `default_timeout` wins.
    pub fn from_metadata(
        metadata: &MetadataMap,
        received: Instant,
        default_timeout: Option<Duration>,
    ) -> Self {
        let caller = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout)
            .map(|t| t - CALLER_DEADLINE_MARGIN.min(t / 2));

        let timeout = match (caller, default_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Self {
            deadline: timeout.map(|t| received + t),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.deadline, Some(d) if d <= Instant::now())
    }

    /// Run `fut` under this context's deadline.
    pub async fn bound<F, T>(&self, fut: F) -> Result<T, ProxyError>
    where
        F: Future<Output = Result<T, ProxyError>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| ProxyError::DeadlineExceeded)?,
            None => fut.await,
        }
    }
}

/// Parse a `grpc-timeout` value: up to 8 ASCII digits followed by one unit
/// character (`H`, `M`, `S`, `m`, `u`, `n`).
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::MetadataValue;

    #[test]
    fn test_parse_grpc_timeout_units() {
        assert_eq!(parse_grpc_timeout("1H"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_grpc_timeout("2M"), Some(Duration::from_secs(120)));
        assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("10u"), Some(Duration::from_micros(10)));
        assert_eq!(parse_grpc_timeout("0n"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_grpc_timeout_rejects_garbage() {
        assert_eq!(parse_grpc_timeout(""), None);
        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("5s"), None);
        assert_eq!(parse_grpc_timeout("-5S"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
    }

    #[test]
    fn test_earliest_timeout_wins() {
        let now = Instant::now();
        let mut metadata = MetadataMap::new();
        metadata.insert(GRPC_TIMEOUT_HEADER, MetadataValue::from_static("200m"));

        let ctx = RequestContext::from_metadata(&metadata, now, Some(Duration::from_secs(5)));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_millis(150)));

        let ctx = RequestContext::from_metadata(&metadata, now, Some(Duration::from_millis(40)));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_millis(40)));

        let ctx = RequestContext::from_metadata(&MetadataMap::new(), now, None);
        assert_eq!(ctx.deadline(), None);
    }

    #[test]
    fn test_caller_deadline_keeps_margin() {
        let now = Instant::now();
        let mut metadata = MetadataMap::new();

        metadata.insert(GRPC_TIMEOUT_HEADER, MetadataValue::from_static("5S"));
        let ctx = RequestContext::from_metadata(&metadata, now, None);
        assert_eq!(ctx.deadline(), Some(now + Duration::from_millis(4950)));

        // Short timeouts give up half rather than all of their budget.
        metadata.insert(GRPC_TIMEOUT_HEADER, MetadataValue::from_static("60m"));
        let ctx = RequestContext::from_metadata(&metadata, now, None);
        assert_eq!(ctx.deadline(), Some(now + Duration::from_millis(30)));

        metadata.insert(GRPC_TIMEOUT_HEADER, MetadataValue::from_static("0m"));
        let ctx = RequestContext::from_metadata(&metadata, now, None);
        assert_eq!(ctx.deadline(), Some(now));
    }

    #[test]
    fn test_zero_timeout_is_expired() {
        let ctx = RequestContext::with_deadline(Instant::now());
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert!(!RequestContext::unbounded().is_expired());
    }

    #[tokio::test]
    async fn test_bound_maps_lapse_to_deadline_exceeded() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(20));
        let result = ctx
            .bound(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ProxyError>(())
            })
            .await;
        assert!(matches!(result, Err(ProxyError::DeadlineExceeded)));
    }
}
