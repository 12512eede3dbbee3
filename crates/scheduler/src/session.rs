//! Wiring of planner, status server and alerter into one running instance.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cynic_core::{Config, SnapshotConfig};
use cynic_notify::{AlertHandler, Alerter};
use cynic_status::{StatusCache, StatusServer};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::ScheduleError;
use crate::event::Event;
use crate::planner::Planner;

/// Everything one cynic instance runs.
pub struct Session {
    events: Vec<Event>,
    planner: Planner,
    status: Option<StatusServer>,
    alerter: Option<Alerter>,
    snapshots: Option<SnapshotConfig>,
    tick_interval: Duration,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            planner: Planner::new(),
            status: None,
            alerter: None,
            snapshots: None,
            tick_interval: Duration::from_secs(1),
        }
    }

    /// Bind the status server and create the alerter described by `config`.
    /// Snapshots are enabled when the config carries a snapshot section.
    pub async fn from_config(
        config: &Config,
        cache: StatusCache,
        handler: Arc<dyn AlertHandler>,
    ) -> Result<Self, ScheduleError> {
        config.validate()?;
        let server = StatusServer::bind(cache, &config.status).await?;
        let mut session = Self::new()
            .with_status_server(server)
            .with_alerter(Alerter::with_handler(config.alert.interval(), handler)?)
            .with_tick_interval(config.planner.tick_interval())?;
        if let Some(snapshots) = &config.snapshot {
            session = session.with_snapshots(snapshots.clone())?;
        }
        Ok(session)
    }

    /// Load `.env`, read the environment and build the session from it.
    pub async fn from_env(
        cache: StatusCache,
        handler: Arc<dyn AlertHandler>,
    ) -> Result<Self, ScheduleError> {
        cynic_core::config::load_dotenv();
        let config = Config::from_env();
        config.log_summary();
        Self::from_config(&config, cache, handler).await
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn add_event(&mut self, event: Event) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn with_status_server(mut self, server: StatusServer) -> Self {
        self.status = Some(server);
        self
    }

    pub fn with_alerter(mut self, alerter: Alerter) -> Self {
        self.alerter = Some(alerter);
        self
    }

    /// Snapshot the status cache while running. Needs a status server.
    /// Zero intervals are rejected.
    pub fn with_snapshots(mut self, config: SnapshotConfig) -> Result<Self, ScheduleError> {
        config.validate()?;
        self.snapshots = Some(config);
        Ok(self)
    }

    /// Wall-clock length of one tick. Events still count in ticks. A zero
    /// interval is rejected.
    pub fn with_tick_interval(mut self, interval: Duration) -> Result<Self, ScheduleError> {
        if interval.is_zero() {
            return Err(ScheduleError::InvalidTickInterval);
        }
        self.tick_interval = interval;
        Ok(self)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Handle to the session's planner, for scheduling while running.
    pub fn planner(&self) -> Planner {
        self.planner.clone()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await;
    }

    /// Start every service, drive ticks until `shutdown` resolves, then stop
    /// the status server (with its snapshot timers) and the alerter, in that
    /// order.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Session {
            events,
            planner,
            status,
            alerter,
            snapshots,
            tick_interval,
        } = self;

        let alerter = alerter.map(|alerter| {
            planner.set_alerter(alerter.sender());
            alerter.start()
        });

        let count = events.len();
        for event in events {
            planner.add(event);
        }

        let status = match (status, snapshots) {
            (Some(server), Some(snapshots)) => match server.with_snapshots(snapshots) {
                Ok(server) => Some(server.start()),
                Err(e) => {
                    error!(error = %e, "invalid snapshot config; status server not started");
                    None
                }
            },
            (Some(server), None) => Some(server.start()),
            (None, Some(_)) => {
                warn!("snapshots configured without a status server; snapshots disabled");
                None
            }
            (None, None) => None,
        };

        info!(events = count, tick = ?tick_interval, "session started");

        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let planner = planner.clone();
                    match tokio::task::spawn_blocking(move || planner.tick()).await {
                        Ok(report) => debug!(tick = report.tick, executed = report.executed, "tick done"),
                        Err(e) => error!(error = %e, "tick panicked"),
                    }
                }
            }
        }

        info!(tick = planner.current_tick(), "session stopping");
        if let Some(status) = status {
            status.stop().await;
        }
        if let Some(alerter) = alerter {
            alerter.stop().await;
        }
        info!("session stopped");
    }
}
