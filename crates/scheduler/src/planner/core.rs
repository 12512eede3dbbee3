use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use cynic_notify::AlertSender;
use serde_json::Value;
use tracing::{debug, trace};

use crate::event::Event;
use crate::id::EventId;
use crate::queue::EventQueue;

/// Queue, cancellation index and tick counter, mutated only under one lock.
pub(super) struct PlannerState {
    pub(super) queue: EventQueue,
    /// Live events by id. Setting the flag cancels the event on its next pop.
    pub(super) index: HashMap<EventId, Arc<AtomicBool>>,
    pub(super) tick: u64,
}

pub(super) struct PlannerInner {
    pub(super) state: Mutex<PlannerState>,
    pub(super) alerts: RwLock<Option<AlertSender>>,
}

/// The scheduler. A cheap `Clone` handle so the tick driver, hooks and callers
/// can share one planner.
#[derive(Clone)]
pub struct Planner {
    pub(super) inner: Arc<PlannerInner>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PlannerInner {
                state: Mutex::new(PlannerState {
                    queue: EventQueue::new(),
                    index: HashMap::new(),
                    tick: 0,
                }),
                alerts: RwLock::new(None),
            }),
        }
    }

    /// Forward hook alerts to `sender` from now on.
    pub fn with_alerter(self, sender: AlertSender) -> Self {
        self.set_alerter(sender);
        self
    }

    pub fn set_alerter(&self, sender: AlertSender) {
        *self.inner.alerts.write().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    /// Schedule `event` relative to the current tick and return its id.
    ///
    /// A periodic event is first due at `tick + offset + period`. An immediate
    /// event is due at `tick + max(1, offset)`, after which it behaves like a
    /// periodic one.
    pub fn add(&self, mut event: Event) -> EventId {
        let mut state = self.lock_state();
        event.schedule_at(state.tick);
        let id = event.id();
        trace!(event = %event.uniq_str(), expiry = event.expiry(), "event scheduled");
        state.index.insert(id, event.tombstone());
        state.queue.push(event);
        id
    }

    /// Cancel a scheduled event. Its hooks will not run again, even if it is
    /// already due in the current tick. Returns `false` for unknown or
    /// finished events.
    pub fn delete(&self, id: EventId) -> bool {
        let mut state = self.lock_state();
        match state.index.remove(&id) {
            Some(tombstone) => {
                tombstone.store(true, Ordering::Release);
                debug!(event_id = %id, "event deleted");
                true
            }
            None => false,
        }
    }

    /// Whether `id` is scheduled and not cancelled.
    pub fn contains(&self, id: EventId) -> bool {
        self.lock_state().index.contains_key(&id)
    }

    /// Events in the heap, cancelled ones not yet popped included.
    pub fn len(&self) -> usize {
        self.lock_state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of the next tick to be processed.
    pub fn current_tick(&self) -> u64 {
        self.lock_state().tick
    }

    /// Send `payload` to the attached alerter. Returns `false` when none is
    /// attached or it has stopped.
    pub(crate) fn send_alert(&self, payload: Value) -> bool {
        let alerts = self.inner.alerts.read().unwrap_or_else(PoisonError::into_inner);
        match alerts.as_ref() {
            Some(sender) => sender.alert(payload),
            None => {
                debug!("alert raised with no alerter attached");
                false
            }
        }
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, PlannerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Display for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        writeln!(f, "tick {}, {} queued", state.tick, state.queue.len())?;
        let mut events: Vec<&Event> = state.queue.iter().collect();
        events.sort_by_key(|e| (e.expiry(), e.id()));
        for event in events {
            write!(f, "  {} due at {}", event.uniq_str(), event.expiry())?;
            if event.is_repeating() {
                write!(f, " every {}", event.period())?;
            }
            if event.is_deleted() {
                write!(f, " (deleted)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Planner")
            .field("tick", &state.tick)
            .field("queued", &state.queue.len())
            .field("live", &state.index.len())
            .finish()
    }
}
