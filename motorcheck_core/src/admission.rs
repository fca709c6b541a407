//! Process-wide bound on concurrently driven motors.
//!
//! The controller only counts; ports track their own ownership via
//! `PortRecord::holds_slot`.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct AdmissionController {
    in_use: AtomicUsize,
    capacity: usize,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            in_use: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok()
    }

    /// Return a slot; a release with nothing held is a no-op.
    pub fn release(&self) {
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
