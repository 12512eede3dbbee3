//! Min-heap of events keyed by absolute expiry.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::event::Event;
use crate::id::EventId;

/// Heap entry ordered only by expiry, reversed so the std max-heap pops the
/// earliest event first. Ties are unordered.
struct ByExpiry(Event);

impl PartialEq for ByExpiry {
    fn eq(&self, other: &Self) -> bool {
        self.0.expiry() == other.0.expiry()
    }
}

impl Eq for ByExpiry {}

impl PartialOrd for ByExpiry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByExpiry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.expiry().cmp(&self.0.expiry())
    }
}

/// Events ordered by expiry. Identity and tombstones mean nothing here; the
/// planner filters cancelled events after popping them.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<ByExpiry>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.heap.push(ByExpiry(event));
    }

    /// Remove and return the event with the smallest expiry.
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|entry| entry.0)
    }

    pub fn peek_expiry(&self) -> Option<u64> {
        self.heap.peek().map(|entry| entry.0.expiry())
    }

    pub fn peek_id(&self) -> Option<EventId> {
        self.heap.peek().map(|entry| entry.0.id())
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Queued events in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.heap.iter().map(|entry| &entry.0)
    }
}
