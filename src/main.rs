//! ALB to gRPC health check proxy.
//!
//! Listens on `AWS.ALB/healthcheck` and answers each poll from a
//! `grpc.health.v1.Health` backend. A poll succeeds only when the target
//! service (or the whole server when none is configured) reports SERVING.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │              HEALTH CHECK PROXY              │
//!                        │                                              │
//!   ALB poll             │  ┌──────────┐     ┌──────────────────────┐   │
//!   ─────────────────────┼─▶│  grpc    │────▶│ query: Check per poll│───┼──▶ Backend
//!   AWS.ALB/healthcheck  │  │ endpoint │     └──────────────────────┘   │    grpc.health.v1
//!                        │  │          │     ┌──────────────────────┐   │
//!   ok / UNAVAILABLE     │  │          │◀────│ subscribe: cached    │◀──┼─── Watch stream
//!   ◀────────────────────┼──│translate │     │ status cell          │   │
//!                        │  └──────────┘     └──────────────────────┘   │
//!                        │                                              │
//!                        │  config · lifecycle · observability · retry  │
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;

use alb_health_proxy::config::Cli;
use alb_health_proxy::lifecycle::{signals, startup, Shutdown};
use alb_health_proxy::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init(&config.observability);

    tracing::info!(
        listener = %config.listener.bind_address(),
        backend = %config.backend.address,
        service = %config.backend.service,
        mode = config.mode.as_str(),
        connect_timeout = ?config.backend.connect_timeout(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::forward_to(shutdown.clone()));

    if let Err(e) = startup::run(&config, &shutdown).await {
        tracing::error!(error = %e, "Proxy terminated");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
