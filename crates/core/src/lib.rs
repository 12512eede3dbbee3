pub mod config;
pub mod error;

pub use config::{AlertConfig, Config, PlannerConfig, SnapshotConfig, StatusConfig};
pub use error::*;
