use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cynic_status::StatusCache;

use crate::error::ScheduleError;
use crate::hook::{Hook, HookContext, HookOutcome};
use crate::id::{EventId, EventIds};

/// One schedulable unit of work: timing, a list of hooks, and side channels.
///
/// Times are in ticks (seconds). An event is handed to the planner by value;
/// the planner owns it from then on and refers to it by [`EventId`].
pub struct Event {
    id: EventId,
    label: Option<String>,
    period: u64,
    offset: u64,
    immediate: bool,
    repeat: bool,
    expiry: u64,
    hooks: Vec<Hook>,
    status: Option<StatusCache>,
    extra: Option<Arc<dyn Any + Send + Sync>>,
    deleted: Arc<AtomicBool>,
}

impl Event {
    /// Create an event running every `period` ticks. A zero period is rejected.
    pub fn new(ids: &EventIds, period: u64) -> Result<Self, ScheduleError> {
        if period == 0 {
            return Err(ScheduleError::InvalidPeriod);
        }
        Ok(Self {
            id: ids.next_id(),
            label: None,
            period,
            offset: 0,
            immediate: false,
            repeat: false,
            expiry: 0,
            hooks: Vec::new(),
            status: None,
            extra: None,
            deleted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    /// Absolute tick at which the event is due. Set by the planner on insertion.
    pub fn expiry(&self) -> u64 {
        self.expiry
    }

    pub fn num_hooks(&self) -> usize {
        self.hooks.len()
    }

    pub fn status_cache(&self) -> Option<&StatusCache> {
        self.status.as_ref()
    }

    pub fn extra<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extra.as_deref().and_then(|extra| extra.downcast_ref::<T>())
    }

    /// `"<label>-<id>"`, or just the id when unlabeled.
    pub fn uniq_str(&self) -> String {
        match &self.label {
            Some(label) => format!("{}-{}", label, self.id),
            None => self.id.to_string(),
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    pub fn set_period(&mut self, period: u64) -> Result<&mut Self, ScheduleError> {
        if period == 0 {
            return Err(ScheduleError::InvalidPeriod);
        }
        self.period = period;
        Ok(self)
    }

    /// Delay, in ticks, before the first run.
    pub fn set_offset(&mut self, offset: u64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Run on the next tick (after any offset) instead of waiting a full period.
    pub fn set_immediate(&mut self, immediate: bool) -> &mut Self {
        self.immediate = immediate;
        self
    }

    pub fn set_repeat(&mut self, repeat: bool) -> &mut Self {
        self.repeat = repeat;
        self
    }

    pub fn add_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&HookContext<'_>) -> HookOutcome + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn set_status_cache(&mut self, cache: StatusCache) -> &mut Self {
        self.status = Some(cache);
        self
    }

    pub fn set_extra<T: Any + Send + Sync>(&mut self, extra: T) -> &mut Self {
        self.extra = Some(Arc::new(extra));
        self
    }

    pub(crate) fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    pub(crate) fn tombstone(&self) -> Arc<AtomicBool> {
        self.deleted.clone()
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Compute the expiry for insertion at `tick`. An immediate event is
    /// consumed here: it reverts to a plain periodic event for later runs.
    pub(crate) fn schedule_at(&mut self, tick: u64) {
        if self.immediate {
            self.expiry = tick + self.offset.max(1);
            self.immediate = false;
            self.offset = 0;
        } else {
            self.expiry = tick + self.offset + self.period;
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("period", &self.period)
            .field("offset", &self.offset)
            .field("immediate", &self.immediate)
            .field("repeat", &self.repeat)
            .field("expiry", &self.expiry)
            .field("hooks", &self.hooks.len())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_rejected() {
        let ids = EventIds::new();
        assert!(matches!(Event::new(&ids, 0), Err(ScheduleError::InvalidPeriod)));

        let mut event = Event::new(&ids, 5).unwrap();
        assert!(event.set_period(0).is_err());
        assert_eq!(event.period(), 5);
    }

    #[test]
    fn uniq_str_uses_label_when_present() {
        let ids = EventIds::new();
        let mut event = Event::new(&ids, 1).unwrap();
        assert_eq!(event.uniq_str(), event.id().to_string());

        event.set_label("ping");
        assert_eq!(event.uniq_str(), format!("ping-{}", event.id()));
    }

    #[test]
    fn expiry_for_periodic_event() {
        let ids = EventIds::new();
        let mut event = Event::new(&ids, 10).unwrap();
        event.set_offset(3);
        event.schedule_at(7);
        assert_eq!(event.expiry(), 20);
    }

    #[test]
    fn immediate_event_is_consumed_on_schedule() {
        let ids = EventIds::new();
        let mut event = Event::new(&ids, 10).unwrap();
        event.set_immediate(true);
        event.schedule_at(4);
        assert_eq!(event.expiry(), 5);
        assert!(!event.is_immediate());

        event.schedule_at(5);
        assert_eq!(event.expiry(), 15);
    }

    #[test]
    fn immediate_event_honors_offset() {
        let ids = EventIds::new();
        let mut event = Event::new(&ids, 10).unwrap();
        event.set_immediate(true).set_offset(3);
        event.schedule_at(0);
        assert_eq!(event.expiry(), 3);
        assert_eq!(event.offset(), 0);
    }

    #[test]
    fn extra_downcasts_to_stored_type() {
        #[derive(Debug, PartialEq)]
        struct Target {
            url: &'static str,
        }

        let ids = EventIds::new();
        let mut event = Event::new(&ids, 1).unwrap();
        assert!(event.extra::<Target>().is_none());

        event.set_extra(Target { url: "http://localhost" });
        assert_eq!(event.extra::<Target>(), Some(&Target { url: "http://localhost" }));
        assert!(event.extra::<String>().is_none());
    }
}
