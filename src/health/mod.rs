//! Health status model.
//!
//! # Data Flow
//! ```text
//! Query mode:
//!     Check response → status.rs (ServingStatus) → translate → pass/fail
//!
//! Subscribe mode:
//!     Watch update → state.rs (StatusWriter::publish)
//!     poll → state.rs (StatusCell::load) → translate → pass/fail
//! ```
//!
//! # Design Decisions
//! - `translate` is the only place that decides what "healthy" means
//! - The cell has exactly one writer; readers never take a lock

pub mod state;
pub mod status;

pub use state::{status_cell, StatusCell, StatusWriter};
pub use status::{translate, ServingStatus, TargetService};
