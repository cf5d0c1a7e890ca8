//! Shared utilities for integration tests: a programmable grpc.health.v1 backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};

type WatchSender = mpsc::Sender<Result<HealthCheckResponse, Status>>;

#[derive(Default)]
struct MockState {
    statuses: Mutex<HashMap<String, ServingStatus>>,
    watchers: Mutex<Vec<WatchSender>>,
    check_calls: AtomicUsize,
    watch_calls: AtomicUsize,
    refuse_watch: AtomicBool,
    check_delay: Mutex<Option<Duration>>,
}

#[derive(Clone)]
struct MockHealth {
    state: Arc<MockState>,
}

#[tonic::async_trait]
impl Health for MockHealth {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        self.state.check_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.check_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let service = request.into_inner().service;
        let status = self.state.statuses.lock().unwrap().get(&service).copied();
        match status {
            Some(status) => Ok(Response::new(HealthCheckResponse {
                status: status as i32,
            })),
            None => Err(Status::not_found(format!("unknown service {service}"))),
        }
    }

    type WatchStream = ReceiverStream<Result<HealthCheckResponse, Status>>;

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        self.state.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.refuse_watch.load(Ordering::SeqCst) {
            return Err(Status::unavailable("watch refused"));
        }

        let (tx, rx) = mpsc::channel(16);
        self.state.watchers.lock().unwrap().push(tx);
        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// A grpc.health.v1 backend whose answers the test controls.
///
/// Watch streams start silent; updates are pushed explicitly so tests can
/// observe the cell before the first update.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    stop: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());
        let (stop, stopped) = oneshot::channel::<()>();

        let service = HealthServer::new(MockHealth { state: state.clone() });
        tokio::spawn(async move {
            let _ = tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = stopped.await;
                })
                .await;
        });

        Self {
            addr,
            state,
            stop: Some(stop),
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn set_status(&self, service: &str, status: ServingStatus) {
        self.state
            .statuses
            .lock()
            .unwrap()
            .insert(service.to_string(), status);
    }

    pub fn set_check_delay(&self, delay: Duration) {
        *self.state.check_delay.lock().unwrap() = Some(delay);
    }

    pub fn refuse_watch(&self, refuse: bool) {
        self.state.refuse_watch.store(refuse, Ordering::SeqCst);
    }

    pub fn check_calls(&self) -> usize {
        self.state.check_calls.load(Ordering::SeqCst)
    }

    pub fn watch_calls(&self) -> usize {
        self.state.watch_calls.load(Ordering::SeqCst)
    }

    /// Send an update to every open Watch stream.
    pub async fn push(&self, status: ServingStatus) {
        let watchers: Vec<WatchSender> = self.state.watchers.lock().unwrap().clone();
        for tx in watchers {
            let _ = tx
                .send(Ok(HealthCheckResponse {
                    status: status as i32,
                }))
                .await;
        }
    }

    /// End every open Watch stream cleanly.
    pub fn close_watches(&self) {
        self.state.watchers.lock().unwrap().clear();
    }

    /// End every open Watch stream with an error.
    pub async fn fail_watches(&self, status: Status) {
        let watchers: Vec<WatchSender> = self.state.watchers.lock().unwrap().drain(..).collect();
        for tx in watchers {
            let _ = tx.send(Err(status.clone())).await;
        }
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.close_watches();
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
