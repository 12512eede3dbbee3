//! Alert batching for cynic.
//!
//! This crate provides:
//! - `AlertMessage`, the record a hook produces when it wants attention
//! - `AlertHandler` trait for pluggable delivery, with closure and log adapters
//! - `Alerter`, which collects alerts on its own task and flushes them per window

pub mod alerter;
pub mod message;
pub mod traits;

pub use alerter::{AlertSender, Alerter, AlerterHandle};
pub use message::{current_host, AlertMessage};
pub use traits::{AlertHandler, FnAlertHandler, LogAlertHandler, NotifyError};
