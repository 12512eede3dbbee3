//! Time-windowed alert batching.
//!
//! Hooks produce alerts synchronously from inside the planner's tick; the
//! [`Alerter`] collects them on a separate tokio task and hands the whole
//! window to an [`AlertHandler`] every `interval`. A slow handler therefore
//! never delays a tick: producing an alert is an unbounded channel send.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::message::AlertMessage;
use crate::traits::{AlertHandler, NotifyError};

/// Cloneable, non-blocking producer side of an [`Alerter`].
#[derive(Clone)]
pub struct AlertSender {
    tx: mpsc::UnboundedSender<AlertMessage>,
}

impl AlertSender {
    /// Queue a message for the next batch.
    ///
    /// Returns `false` when the alerter has already shut down.
    pub fn send(&self, message: AlertMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(_) => {
                warn!("alert dropped: alerter is not running");
                false
            }
        }
    }

    /// Stamp `payload` with time and host and queue it.
    pub fn alert(&self, payload: serde_json::Value) -> bool {
        self.send(AlertMessage::new(payload))
    }
}

impl std::fmt::Debug for AlertSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Alerts accumulated during the current window.
struct PendingAlerts {
    buffer: Vec<AlertMessage>,
}

impl PendingAlerts {
    fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn push(&mut self, message: AlertMessage) {
        self.buffer.push(message);
    }

    fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Take the whole window, leaving the buffer empty.
    fn flush(&mut self) -> Vec<AlertMessage> {
        std::mem::take(&mut self.buffer)
    }
}

/// An alerter that has been configured but not started.
///
/// Messages sent through [`Alerter::sender`] before [`Alerter::start`] wait in
/// the channel and land in the first window.
pub struct Alerter {
    interval: Duration,
    handler: Arc<dyn AlertHandler>,
    tx: mpsc::UnboundedSender<AlertMessage>,
    rx: mpsc::UnboundedReceiver<AlertMessage>,
}

impl Alerter {
    /// Create an alerter flushing to `handler` every `interval`. A zero
    /// interval is rejected.
    pub fn new(interval: Duration, handler: impl AlertHandler + 'static) -> Result<Self, NotifyError> {
        Self::with_handler(interval, Arc::new(handler))
    }

    pub fn with_handler(interval: Duration, handler: Arc<dyn AlertHandler>) -> Result<Self, NotifyError> {
        if interval.is_zero() {
            return Err(NotifyError::InvalidInterval);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            interval,
            handler,
            tx,
            rx,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sender(&self) -> AlertSender {
        AlertSender {
            tx: self.tx.clone(),
        }
    }

    /// Spawn the processing loop on the current tokio runtime.
    pub fn start(self) -> AlerterHandle {
        let shutdown = Arc::new(Notify::new());
        let sender = self.sender();
        info!(
            handler = self.handler.name(),
            interval = ?self.interval,
            "alerter started"
        );
        let task = tokio::spawn(run_loop(
            self.rx,
            self.interval,
            self.handler,
            shutdown.clone(),
        ));
        AlerterHandle {
            sender,
            shutdown,
            task,
        }
    }
}

/// A running alerter. Dropping the handle leaves the loop running; call
/// [`AlerterHandle::stop`] to drain and end it.
pub struct AlerterHandle {
    sender: AlertSender,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl AlerterHandle {
    pub fn sender(&self) -> AlertSender {
        self.sender.clone()
    }

    /// Stop the loop. Alerts already queued are delivered as a final batch.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "alerter task ended abnormally");
        }
        info!("alerter stopped");
    }
}

async fn run_loop(
    mut rx: mpsc::UnboundedReceiver<AlertMessage>,
    interval: Duration,
    handler: Arc<dyn AlertHandler>,
    shutdown: Arc<Notify>,
) {
    let mut pending = PendingAlerts::new();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(message) = rx.recv() => {
                pending.push(message);
            }
            _ = ticker.tick() => {
                if !pending.is_empty() {
                    deliver(&*handler, pending.flush()).await;
                }
            }
            _ = shutdown.notified() => {
                break;
            }
        }
    }

    while let Ok(message) = rx.try_recv() {
        pending.push(message);
    }
    if !pending.is_empty() {
        debug!("delivering final alert batch on shutdown");
        deliver(&*handler, pending.flush()).await;
    }
}

async fn deliver(handler: &dyn AlertHandler, batch: Vec<AlertMessage>) {
    let start = Instant::now();
    let count = batch.len();
    match handler.deliver(&batch).await {
        Ok(()) => {
            info!(
                handler = handler.name(),
                count,
                duration_ms = start.elapsed().as_millis() as u64,
                "alert batch delivered"
            );
        }
        Err(e) => {
            warn!(
                handler = handler.name(),
                count,
                error = %e,
                "alert batch delivery failed"
            );
        }
    }
}
