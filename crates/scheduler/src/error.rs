use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("event period must be greater than zero")]
    InvalidPeriod,

    #[error("invalid event distribution: {0}")]
    InvalidDistribution(String),

    #[error("tick interval must be greater than zero")]
    InvalidTickInterval,

    #[error("configuration error: {0}")]
    Config(#[from] cynic_core::CynicError),

    #[error("status server error: {0}")]
    Status(#[from] cynic_status::StatusError),

    #[error("alerter error: {0}")]
    Notify(#[from] cynic_notify::NotifyError),
}
