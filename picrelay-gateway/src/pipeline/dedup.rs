//! Bounded recency set for at-least-once delivered trigger events.
//!
//! Eviction is by insertion order only. Once a key has been pushed out, a
//! late redelivery of the same event is processed again.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct SeenEvents {
    order: VecDeque<String>,
    members: HashSet<String>,
}

/// Remembers the most recent idempotency keys up to a fixed capacity.
#[derive(Debug)]
pub struct EventDeduplicator {
    seen: Mutex<SeenEvents>,
    capacity: usize,
}

impl EventDeduplicator {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(SeenEvents::default()),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` if `key` was already seen. Otherwise records it,
    /// evicting the oldest key when full, and returns `false`.
    ///
    /// Membership check, eviction and insert happen under one lock with no
    /// await point inside.
    pub fn is_duplicate(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.members.contains(key) {
            return true;
        }

        while seen.order.len() >= self.capacity {
            match seen.order.pop_front() {
                Some(oldest) => {
                    seen.members.remove(&oldest);
                }
                None => break,
            }
        }

        seen.order.push_back(key.to_string());
        seen.members.insert(key.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .members
            .contains(key)
    }
}
