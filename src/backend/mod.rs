//! Backend health protocol client.
//!
//! # Data Flow
//! ```text
//! startup:
//!     connector.rs (connect once, bounded by connect timeout)
//!     → BackendConnection (shared by every poll / the subscription)
//!
//! query mode, per poll:
//!     query.rs → grpc.health.v1.Health/Check → ServingStatus
//!
//! subscribe mode, background task:
//!     subscription.rs → grpc.health.v1.Health/Watch → StatusWriter
//!     stream ends → UNKNOWN → backoff → Watch again
//! ```
//!
//! # Design Decisions
//! - One channel for the process lifetime; never reconnect per poll
//! - Connector and query never retry; only the subscription is supervised

pub mod connector;
pub mod query;
pub mod subscription;

pub use connector::{connect, BackendConnection};
pub use query::{check_once, LocalHealth};
pub use subscription::{Subscription, SubscriptionHandle, SubscriptionState};
