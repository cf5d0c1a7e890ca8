//! Long-lived status subscription.
//!
//! # States
//! - NotStarted: no Watch stream open
//! - Streaming: updates flow into the status cell
//! - Terminated: the stream ended; the cell was reset to UNKNOWN
//! - GaveUp: resubscription attempts were exhausted
//!
//! # State Transitions
//! ```text
//! NotStarted → Streaming: Watch opened (startup failure is fatal)
//! Streaming → Streaming: update received, cell replaced
//! Streaming → Terminated: server closed the stream or transport error
//! Terminated → NotStarted: backoff elapsed, retry enabled
//! Terminated → GaveUp: max_attempts consecutive attempts without an update
//! ```
//!
//! # Design Decisions
//! - The task owns the only `StatusWriter`
//! - Updates are applied in receipt order, latest wins
//! - The attempt counter resets once a stream has delivered an update
//! - Shutdown is the only cancellation source

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tonic::{Request, Streaming};
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};

use crate::backend::connector::BackendConnection;
use crate::config::RetryConfig;
use crate::error::ProxyError;
use crate::health::{status_cell, ServingStatus, StatusCell, StatusWriter, TargetService};
use crate::observability::metrics;
use crate::resilience::Backoff;

/// Observable state of the subscription supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    NotStarted,
    Streaming,
    Terminated,
    GaveUp,
}

/// Why a Watch stream stopped delivering updates.
#[derive(Debug)]
enum StreamEnd {
    Closed,
    Failed(tonic::Status),
    Shutdown,
}

/// Supervisor for the backend Watch stream.
pub struct Subscription {
    conn: BackendConnection,
    service: TargetService,
    retry: RetryConfig,
    writer: StatusWriter,
    state: watch::Sender<SubscriptionState>,
}

impl Subscription {
    pub fn new(conn: BackendConnection, service: TargetService, retry: RetryConfig) -> Self {
        let (writer, _) = status_cell();
        let (state, _) = watch::channel(SubscriptionState::NotStarted);
        Self {
            conn,
            service,
            retry,
            writer,
            state,
        }
    }

    /// Open the first stream and hand the rest of the lifecycle to a background task.
    ///
    /// Failing to open the first stream is returned to the caller; every later
    /// failure is absorbed and shows up as UNKNOWN in the cell.
    pub async fn start(
        self,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<SubscriptionHandle, ProxyError> {
        let stream = self.open().await?;
        self.state.send_replace(SubscriptionState::Streaming);

        tracing::info!(
            address = %self.conn.address(),
            service = %self.service,
            "Subscribed to backend health updates"
        );

        let cell = self.writer.reader();
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(stream, shutdown));

        Ok(SubscriptionHandle { task, state, cell })
    }

    async fn open(&self) -> Result<Streaming<HealthCheckResponse>, ProxyError> {
        let request = Request::new(HealthCheckRequest {
            service: self.service.as_str().to_string(),
        });
        let response = self
            .conn
            .health_client()
            .watch(request)
            .await
            .map_err(ProxyError::Backend)?;
        Ok(response.into_inner())
    }

    async fn run(
        self,
        mut stream: Streaming<HealthCheckResponse>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let backoff = Backoff::from_config(&self.retry);
        let mut attempt: u32 = 0;

        loop {
            let (end, received) = self.pump(&mut stream, &mut shutdown).await;

            let last = self.writer.reset();
            metrics::record_backend_status(ServingStatus::Unknown);
            self.state.send_replace(SubscriptionState::Terminated);

            match end {
                StreamEnd::Closed => {
                    tracing::warn!(service = %self.service, last_status = %last, "Stream closed by server")
                }
                StreamEnd::Failed(status) => {
                    tracing::warn!(service = %self.service, last_status = %last, error = %status, "Stream error")
                }
                StreamEnd::Shutdown => {
                    tracing::info!("Subscription received shutdown signal, exiting loop");
                    return;
                }
            }

            if !self.retry.enabled {
                tracing::warn!(
                    service = %self.service,
                    "Resubscription disabled; status stays UNKNOWN"
                );
                return;
            }

            if received > 0 {
                attempt = 0;
            }

            stream = match self.resubscribe(&backoff, &mut attempt, &mut shutdown).await {
                Some(stream) => stream,
                None => return,
            };
        }
    }

    /// Apply updates to the cell until the stream ends. Returns how it ended
    /// and how many updates it delivered.
    async fn pump(
        &self,
        stream: &mut Streaming<HealthCheckResponse>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> (StreamEnd, u64) {
        let mut received = 0;
        loop {
            tokio::select! {
                message = stream.message() => match message {
                    Ok(Some(update)) => {
                        received += 1;
                        let status = ServingStatus::from(update.status());
                        let previous = self.writer.publish(status);
                        metrics::record_backend_status(status);
                        if previous != status {
                            tracing::info!(service = %self.service, from = %previous, to = %status, "Backend status changed");
                        }
                    }
                    Ok(None) => return (StreamEnd::Closed, received),
                    Err(status) => return (StreamEnd::Failed(status), received),
                },
                _ = shutdown.recv() => return (StreamEnd::Shutdown, received),
            }
        }
    }

    /// Retry Watch with backoff until a stream opens, attempts run out, or shutdown.
    async fn resubscribe(
        &self,
        backoff: &Backoff,
        attempt: &mut u32,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Option<Streaming<HealthCheckResponse>> {
        loop {
            *attempt += 1;
            if self.retry.max_attempts > 0 && *attempt > self.retry.max_attempts {
                tracing::error!(
                    address = %self.conn.address(),
                    service = %self.service,
                    attempts = self.retry.max_attempts,
                    "Giving up on backend subscription; every poll will fail until restart"
                );
                metrics::record_subscription_exhausted();
                self.state.send_replace(SubscriptionState::GaveUp);
                return None;
            }

            let delay = backoff.delay(*attempt);
            tracing::info!(attempt = *attempt, delay = ?delay, "Resubscribing to backend");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => return None,
            }

            self.state.send_replace(SubscriptionState::NotStarted);
            let opened = tokio::select! {
                opened = self.open() => opened,
                _ = shutdown.recv() => return None,
            };

            match opened {
                Ok(stream) => {
                    metrics::record_subscription_restart();
                    self.state.send_replace(SubscriptionState::Streaming);
                    tracing::info!(attempt = *attempt, service = %self.service, "Resubscribed to backend");
                    return Some(stream);
                }
                Err(e) => {
                    self.state.send_replace(SubscriptionState::Terminated);
                    tracing::warn!(attempt = *attempt, error = %e, "Resubscribe failed");
                }
            }
        }
    }
}

/// Handle onto a running subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
    state: watch::Receiver<SubscriptionState>,
    cell: StatusCell,
}

impl SubscriptionHandle {
    /// Read side of the status cell fed by this subscription.
    pub fn cell(&self) -> StatusCell {
        self.cell.clone()
    }

    /// Receiver for supervisor state changes.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Wait for the background task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Subscription task failed");
        }
    }
}
