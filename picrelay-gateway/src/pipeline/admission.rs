//! Admission control for provider-bound jobs.
//!
//! A fixed ceiling on jobs in flight. Callers that cannot get a slot are
//! rejected immediately; there is no waiting queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks jobs in flight against a fixed ceiling.
#[derive(Debug)]
pub struct AdmissionGate {
    in_flight: Arc<AtomicUsize>,
    ceiling: usize,
}

/// A reserved slot. Dropping it releases the slot, so every exit path of the
/// owning task (including a panic) gives the slot back exactly once.
#[derive(Debug)]
#[must_use = "dropping the guard releases the slot immediately"]
pub struct SlotGuard {
    in_flight: Arc<AtomicUsize>,
}

impl AdmissionGate {
    pub fn new(ceiling: usize) -> Self {
        Self {
            in_flight: Arc::new(AtomicUsize::new(0)),
            ceiling,
        }
    }

    /// Reserve a slot if one is free.
    ///
    /// The check and the increment are one atomic step, so concurrent
    /// callers can never push the count past the ceiling.
    pub fn try_admit(&self) -> Option<SlotGuard> {
        let ceiling = self.ceiling;
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < ceiling).then_some(count + 1)
            })
            .ok()
            .map(|_| SlotGuard {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
