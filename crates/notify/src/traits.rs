//! Alert handler trait definition and shared error types.

use crate::message::AlertMessage;

/// Errors that can occur during alert delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Alert interval must be greater than zero")]
    InvalidInterval,
}

/// Receives every flushed batch of alerts.
///
/// Implementations decide what an alert means for the deployment: paging,
/// chat messages, log lines. A failing delivery is logged by the alerter
/// and the batch is dropped.
#[async_trait::async_trait]
pub trait AlertHandler: Send + Sync {
    /// Deliver one batch, in production order.
    async fn deliver(&self, batch: &[AlertMessage]) -> Result<(), NotifyError>;

    /// Human-readable name for this handler (used in logs).
    fn name(&self) -> &str {
        "alert-handler"
    }
}

/// Adapts a plain closure into an [`AlertHandler`].
pub struct FnAlertHandler<F> {
    name: String,
    f: F,
}

impl<F> FnAlertHandler<F>
where
    F: Fn(&[AlertMessage]) + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait::async_trait]
impl<F> AlertHandler for FnAlertHandler<F>
where
    F: Fn(&[AlertMessage]) + Send + Sync,
{
    async fn deliver(&self, batch: &[AlertMessage]) -> Result<(), NotifyError> {
        (self.f)(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Writes each alert of a batch to the tracing log at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertHandler;

#[async_trait::async_trait]
impl AlertHandler for LogAlertHandler {
    async fn deliver(&self, batch: &[AlertMessage]) -> Result<(), NotifyError> {
        for alert in batch {
            let response = serde_json::to_string(&alert.response)?;
            tracing::warn!(
                host = %alert.hostname,
                at = %alert.now,
                response = %response,
                "alert"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
