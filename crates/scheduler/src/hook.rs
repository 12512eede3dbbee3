//! What a hook sees and what it returns.

use std::any::Any;
use std::sync::Arc;

use cynic_status::StatusCache;
use serde_json::Value;

use crate::event::Event;
use crate::id::EventId;
use crate::planner::Planner;

/// A probe function attached to an event.
///
/// Hooks run on the tick thread, one after another, with the planner lock
/// released: they may block, and they may add or delete events.
pub type Hook = Arc<dyn Fn(&HookContext<'_>) -> HookOutcome + Send + Sync>;

/// Result of one hook invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HookOutcome {
    /// Whether `payload` should be batched for alert delivery.
    pub alert: bool,
    pub payload: Value,
}

impl HookOutcome {
    /// Nothing to report.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Raise an alert carrying `payload`.
    pub fn alert(payload: impl Into<Value>) -> Self {
        Self {
            alert: true,
            payload: payload.into(),
        }
    }

    /// Return `payload` without alerting.
    pub fn quiet(payload: impl Into<Value>) -> Self {
        Self {
            alert: false,
            payload: payload.into(),
        }
    }
}

/// Per-invocation view handed to a hook.
pub struct HookContext<'a> {
    planner: &'a Planner,
    event: &'a Event,
    tick: u64,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(planner: &'a Planner, event: &'a Event, tick: u64) -> Self {
        Self {
            planner,
            event,
            tick,
        }
    }

    pub fn planner(&self) -> &Planner {
        self.planner
    }

    /// Schedule another event on the running planner.
    pub fn add(&self, event: Event) -> EventId {
        self.planner.add(event)
    }

    /// Cancel an event on the running planner.
    pub fn delete(&self, id: EventId) -> bool {
        self.planner.delete(id)
    }

    /// Queue an alert immediately, independent of this hook's outcome.
    pub fn alert(&self, payload: impl Into<Value>) -> bool {
        self.planner.send_alert(payload.into())
    }

    /// Status cache attached to the running event, if any.
    pub fn status(&self) -> Option<&StatusCache> {
        self.event.status_cache()
    }

    /// The event's extra payload, if one was attached and it is a `T`.
    pub fn extra<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.event.extra::<T>()
    }

    pub fn event_id(&self) -> EventId {
        self.event.id()
    }

    pub fn label(&self) -> Option<&str> {
        self.event.label()
    }

    /// The tick being processed.
    pub fn tick(&self) -> u64 {
        self.tick
    }
}
