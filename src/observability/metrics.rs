//! Metrics collection and exposition.
//!
//! # Metrics
//! - `alb_proxy_polls_total` (counter): polls by mode and outcome
//! - `alb_proxy_poll_duration_seconds` (histogram): poll latency by mode
//! - `alb_proxy_backend_status` (gauge): cached status, 0=UNKNOWN 1=SERVING 2=NOT_SERVING
//! - `alb_proxy_subscription_restarts_total` (counter): successful resubscriptions
//! - `alb_proxy_subscription_exhausted_total` (counter): supervisor gave up

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::error::ProxyError;
use crate::health::ServingStatus;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_poll(mode: &'static str, result: &Result<(), ProxyError>, start: Instant) {
    let outcome = match result {
        Ok(()) => "ok",
        Err(e) => e.kind(),
    };
    counter!("alb_proxy_polls_total", "mode" => mode, "outcome" => outcome).increment(1);
    histogram!("alb_proxy_poll_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_status(status: ServingStatus) {
    gauge!("alb_proxy_backend_status").set(status.as_gauge());
}

pub fn record_subscription_restart() {
    counter!("alb_proxy_subscription_restarts_total").increment(1);
}

pub fn record_subscription_exhausted() {
    counter!("alb_proxy_subscription_exhausted_total").increment(1);
}
