//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Connect backend → Bind listener → Open subscription (subscribe mode) → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop subscription → Drain polls → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds only after the backend is reachable

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{ProxyRuntime, StartupError};
