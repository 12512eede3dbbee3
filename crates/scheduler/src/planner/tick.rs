use std::time::Instant;

use tracing::{debug, trace};

use crate::event::Event;
use crate::hook::HookContext;

use super::Planner;

/// What one call to [`Planner::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick that was processed.
    pub tick: u64,
    /// Events whose hooks ran.
    pub executed: usize,
    /// Cancelled events discarded without running.
    pub dropped: usize,
    /// Alerts raised by hook outcomes.
    pub alerts: usize,
}

impl Planner {
    /// Process the current tick, then advance the counter.
    ///
    /// Every event whose expiry is at or before the current tick runs, so
    /// overdue events catch up in one pass. Repeating events are rescheduled
    /// from the current tick, not from their missed expiry.
    pub fn tick(&self) -> TickReport {
        let start = Instant::now();
        let mut report = TickReport {
            tick: self.current_tick(),
            ..TickReport::default()
        };

        while let Some(event) = self.pop_due() {
            if event.is_deleted() {
                trace!(event = %event.uniq_str(), "dropping deleted event");
                report.dropped += 1;
                continue;
            }

            report.alerts += self.execute(&event, report.tick);
            report.executed += 1;

            if event.is_repeating() {
                self.reschedule(event);
            } else {
                self.retire(&event);
            }
        }

        self.lock_state().tick += 1;

        if report.executed > 0 || report.dropped > 0 {
            debug!(
                tick = report.tick,
                executed = report.executed,
                dropped = report.dropped,
                alerts = report.alerts,
                duration_ms = start.elapsed().as_millis() as u64,
                "tick processed"
            );
        }
        report
    }

    /// Pop the heap head if it is due. The lock is released on return.
    fn pop_due(&self) -> Option<Event> {
        let mut state = self.lock_state();
        match state.queue.peek_expiry() {
            Some(expiry) if expiry <= state.tick => state.queue.pop(),
            _ => None,
        }
    }

    /// Run every hook of `event` in order, forwarding alerts. Returns the
    /// number of alerts raised.
    fn execute(&self, event: &Event, tick: u64) -> usize {
        let ctx = HookContext::new(self, event, tick);
        let mut alerts = 0;
        for hook in event.hooks() {
            let outcome = hook(&ctx);
            if outcome.alert {
                alerts += 1;
                self.send_alert(outcome.payload);
            }
        }
        trace!(event = %event.uniq_str(), hooks = event.num_hooks(), alerts, "event executed");
        alerts
    }

    /// Re-add a repeating event unless it was deleted while its hooks ran.
    /// Checked under the lock so a concurrent delete cannot be lost.
    fn reschedule(&self, mut event: Event) {
        let mut state = self.lock_state();
        if event.is_deleted() {
            return;
        }
        event.schedule_at(state.tick);
        state.index.insert(event.id(), event.tombstone());
        state.queue.push(event);
    }

    /// Forget a finished event so later deletes report it as unknown.
    fn retire(&self, event: &Event) {
        let mut state = self.lock_state();
        let tombstone = event.tombstone();
        if state
            .index
            .get(&event.id())
            .is_some_and(|entry| std::sync::Arc::ptr_eq(entry, &tombstone))
        {
            state.index.remove(&event.id());
        }
    }
}
