//! Tick-driven planner.
//!
//! Split into focused submodules:
//! - `core`: Planner handle, shared state, add/delete and accessors
//! - `tick`: draining due events, running hooks and rescheduling

mod core;
mod tick;

pub use self::core::Planner;
pub use self::tick::TickReport;
