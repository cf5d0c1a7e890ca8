//! Cached serving status for subscribe mode.
//!
//! # Invariants
//! - Exactly one `StatusWriter` exists per cell; it is not `Clone`
//! - Starts at UNKNOWN; holds either that, the latest update, or UNKNOWN after termination
//! - Reads and writes are single atomic operations, so a value is never torn

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::health::status::ServingStatus;

/// Create a fresh cell, returning its sole writer and a reader handle.
pub fn status_cell() -> (StatusWriter, StatusCell) {
    let slot = Arc::new(AtomicU8::new(ServingStatus::Unknown as u8));
    (StatusWriter { slot: slot.clone() }, StatusCell { slot })
}

/// Read handle onto the current status. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusCell {
    slot: Arc<AtomicU8>,
}

impl StatusCell {
    /// Most recently published status.
    pub fn load(&self) -> ServingStatus {
        ServingStatus::from(self.slot.load(Ordering::Acquire))
    }
}

/// Write handle owned by the subscription task.
#[derive(Debug)]
pub struct StatusWriter {
    slot: Arc<AtomicU8>,
}

impl StatusWriter {
    /// Replace the cached status, returning the previous value.
    pub fn publish(&self, status: ServingStatus) -> ServingStatus {
        ServingStatus::from(self.slot.swap(status as u8, Ordering::AcqRel))
    }

    /// Fall back to UNKNOWN after the stream has ended.
    pub fn reset(&self) -> ServingStatus {
        self.publish(ServingStatus::Unknown)
    }

    /// A reader handle onto the same cell.
    pub fn reader(&self) -> StatusCell {
        StatusCell { slot: self.slot.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let (_writer, cell) = status_cell();
        assert_eq!(cell.load(), ServingStatus::Unknown);
    }

    #[test]
    fn test_publish_and_reset() {
        let (writer, cell) = status_cell();
        assert_eq!(writer.publish(ServingStatus::Serving), ServingStatus::Unknown);
        assert_eq!(cell.load(), ServingStatus::Serving);
        assert_eq!(writer.reset(), ServingStatus::Serving);
        assert_eq!(cell.load(), ServingStatus::Unknown);
    }

    #[test]
    fn test_concurrent_readers_see_written_values_only() {
        let (writer, cell) = status_cell();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        let seen = cell.load();
                        assert!(matches!(
                            seen,
                            ServingStatus::Unknown | ServingStatus::Serving | ServingStatus::NotServing
                        ));
                    }
                })
            })
            .collect();

        for i in 0..10_000 {
            let next = if i % 2 == 0 { ServingStatus::Serving } else { ServingStatus::NotServing };
            writer.publish(next);
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cell.load(), ServingStatus::NotServing);
    }
}
