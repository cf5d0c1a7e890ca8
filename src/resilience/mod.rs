//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Poll:
//!     grpc-timeout header + configured request timeout
//!     → timeouts.rs (RequestContext deadline)
//!     → query bounded by deadline
//!
//! Subscription termination:
//!     → backoff.rs (exponential delay + jitter, capped)
//!     → resubscribe
//! ```
//!
//! # Design Decisions
//! - Every backend call has a deadline
//! - Queries are never retried; only the long-lived subscription is

pub mod backoff;
pub mod timeouts;

pub use backoff::Backoff;
pub use timeouts::RequestContext;
