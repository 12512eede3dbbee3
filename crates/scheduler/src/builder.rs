//! Bulk configuration of many events at once.

use tracing::debug;

use crate::error::ScheduleError;
use crate::event::Event;
use crate::session::Session;

/// Applies shared settings to a batch of events and wraps them in a
/// [`Session`].
///
/// ```ignore
/// let session = EventBuilder::new(events)
///     .repeatable()
///     .distribute_events(60)
///     .build()?;
/// ```
pub struct EventBuilder {
    events: Vec<Event>,
    repeatable: bool,
    max_time: Option<u64>,
}

impl EventBuilder {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            repeatable: false,
            max_time: None,
        }
    }

    /// Mark every event repeating.
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// Spread the events evenly over `max_time` seconds: with N events each
    /// gets period `max_time / N` and event `i` is offset by `i` periods.
    pub fn distribute_events(mut self, max_time: u64) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn build(mut self) -> Result<Session, ScheduleError> {
        if self.events.is_empty() {
            return Err(ScheduleError::InvalidDistribution(
                "no events to build".to_string(),
            ));
        }

        if let Some(max_time) = self.max_time {
            let count = self.events.len() as u64;
            if max_time == 0 {
                return Err(ScheduleError::InvalidDistribution(
                    "max time must be greater than zero".to_string(),
                ));
            }
            // One-second granularity: more events than seconds cannot be spread.
            if count > max_time {
                return Err(ScheduleError::InvalidDistribution(format!(
                    "{count} events do not fit in {max_time} seconds"
                )));
            }
            let period = max_time / count;
            for (i, event) in self.events.iter_mut().enumerate() {
                event.set_period(period)?.set_offset(period * i as u64);
            }
            debug!(events = count, max_time, period, "events distributed");
        }

        if self.repeatable {
            for event in &mut self.events {
                event.set_repeat(true);
            }
        }

        Ok(Session::new().with_events(self.events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EventIds;

    fn events(n: usize) -> Vec<Event> {
        let ids = EventIds::new();
        (0..n).map(|_| Event::new(&ids, 1).unwrap()).collect()
    }

    #[test]
    fn distributes_evenly() {
        let session = EventBuilder::new(events(4))
            .distribute_events(100)
            .build()
            .unwrap();

        let timing: Vec<(u64, u64)> = session
            .events()
            .iter()
            .map(|e| (e.period(), e.offset()))
            .collect();
        assert_eq!(timing, vec![(25, 0), (25, 25), (25, 50), (25, 75)]);
        assert!(session.events().iter().all(|e| !e.is_repeating()));
    }

    #[test]
    fn repeatable_marks_all_events() {
        let session = EventBuilder::new(events(3)).repeatable().build().unwrap();
        assert!(session.events().iter().all(|e| e.is_repeating()));
    }

    #[test]
    fn inexact_division_rounds_period_down() {
        let session = EventBuilder::new(events(3))
            .distribute_events(10)
            .build()
            .unwrap();
        let offsets: Vec<u64> = session.events().iter().map(|e| e.offset()).collect();
        assert_eq!(offsets, vec![0, 3, 6]);
    }

    #[test]
    fn rejects_more_events_than_seconds() {
        let result = EventBuilder::new(events(11)).distribute_events(10).build();
        assert!(matches!(result, Err(ScheduleError::InvalidDistribution(_))));
    }

    #[test]
    fn rejects_zero_max_time() {
        let result = EventBuilder::new(events(1)).distribute_events(0).build();
        assert!(matches!(result, Err(ScheduleError::InvalidDistribution(_))));
    }

    #[test]
    fn rejects_empty_event_list() {
        let result = EventBuilder::new(Vec::new()).repeatable().build();
        assert!(matches!(result, Err(ScheduleError::InvalidDistribution(_))));
    }
}
