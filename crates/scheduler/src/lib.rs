//! Tick-driven monitoring scheduler for cynic.
//!
//! This crate provides:
//! - `Event`, a periodic or one-shot unit of work carrying hooks
//! - `EventQueue`, the expiry-ordered heap behind the planner
//! - `Planner`, which advances logical time and dispatches due events
//! - `EventBuilder` and `Session`, which wire events, the status server and
//!   the alerter into one running instance

pub mod builder;
pub mod error;
pub mod event;
pub mod hook;
pub mod id;
pub mod planner;
pub mod queue;
pub mod session;

pub use builder::EventBuilder;
pub use error::ScheduleError;
pub use event::Event;
pub use hook::{Hook, HookContext, HookOutcome};
pub use id::{EventId, EventIds};
pub use planner::{Planner, TickReport};
pub use queue::EventQueue;
pub use session::Session;
