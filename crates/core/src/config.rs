use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CynicError;

/// Default port the status server listens on.
pub const DEFAULT_STATUS_PORT: u16 = 9999;

/// Default path the status JSON is served under.
pub const DEFAULT_STATUS_ROOT: &str = "/status/";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub status: StatusConfig,
    /// Present only when `SNAPSHOT_DIR` is configured.
    pub snapshot: Option<SnapshotConfig>,
    pub alert: AlertConfig,
    pub planner: PlannerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CYNIC_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CYNIC_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            status: StatusConfig::from_env_profiled(p),
            snapshot: SnapshotConfig::from_env_profiled(p),
            alert: AlertConfig::from_env_profiled(p),
            planner: PlannerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject values no subsystem can run with.
    pub fn validate(&self) -> Result<(), CynicError> {
        if !self.status.root.starts_with('/') {
            return Err(CynicError::InvalidConfig {
                key: "STATUS_ROOT".to_string(),
                value: self.status.root.clone(),
            });
        }
        if self.alert.interval_secs == 0 {
            return Err(CynicError::InvalidConfig {
                key: "ALERT_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.planner.tick_millis == 0 {
            return Err(CynicError::InvalidConfig {
                key: "TICK_MILLIS".to_string(),
                value: "0".to_string(),
            });
        }
        if let Some(snapshot) = &self.snapshot {
            snapshot.validate()?;
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  status:    {}:{}{} (shutdown timeout {}s)",
            self.status.host,
            self.status.port,
            self.status.root,
            self.status.shutdown_timeout_secs
        );
        match &self.snapshot {
            Some(s) => tracing::info!(
                "  snapshot:  dir={}, every {:?}, dump every {:?}",
                s.dir.display(),
                s.interval(),
                s.dump_every()
            ),
            None => tracing::info!("  snapshot:  (disabled)"),
        }
        tracing::info!("  alert:     batch every {}s", self.alert.interval_secs);
        tracing::info!("  planner:   tick every {}ms", self.planner.tick_millis);
    }
}

// ── Status server ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix for the JSON endpoints.
    pub root: String,
    pub shutdown_timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_STATUS_PORT,
            root: DEFAULT_STATUS_ROOT.to_string(),
            shutdown_timeout_secs: 30,
        }
    }
}

impl StatusConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            host: profiled_env_or(p, "STATUS_HOST", &defaults.host),
            port: profiled_env_u16(p, "STATUS_PORT", defaults.port),
            root: profiled_env_or(p, "STATUS_ROOT", &defaults.root),
            shutdown_timeout_secs: profiled_env_u64(
                p,
                "STATUS_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout_secs,
            ),
        }
    }

    /// Config for a given host/port/root with the default shutdown timeout.
    pub fn new(host: impl Into<String>, port: u16, root: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

// ── Snapshots ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// How often the whole cache is captured.
    pub interval_millis: u64,
    /// How often captured snapshots are written to disk.
    pub dump_every_millis: u64,
    /// Directory receiving `.cynic` files.
    pub dir: PathBuf,
}

impl SnapshotConfig {
    fn from_env_profiled(p: &str) -> Option<Self> {
        let dir = profiled_env_opt(p, "SNAPSHOT_DIR")?;
        Some(Self {
            interval_millis: profiled_env_u64(p, "SNAPSHOT_INTERVAL_SECS", 60).saturating_mul(1000),
            dump_every_millis: profiled_env_u64(p, "SNAPSHOT_DUMP_EVERY_SECS", 120).saturating_mul(1000),
            dir: PathBuf::from(dir),
        })
    }

    /// Millisecond precision; intervals that round down to zero are rejected.
    pub fn new(
        interval: Duration,
        dump_every: Duration,
        dir: impl Into<PathBuf>,
    ) -> Result<Self, CynicError> {
        let config = Self {
            interval_millis: duration_millis(interval),
            dump_every_millis: duration_millis(dump_every),
            dir: dir.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis)
    }

    pub fn dump_every(&self) -> Duration {
        Duration::from_millis(self.dump_every_millis)
    }

    pub fn validate(&self) -> Result<(), CynicError> {
        if self.interval_millis == 0 {
            return Err(CynicError::InvalidConfig {
                key: "SNAPSHOT_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.dump_every_millis == 0 {
            return Err(CynicError::InvalidConfig {
                key: "SNAPSHOT_DUMP_EVERY_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Window over which alerts are batched before delivery.
    pub interval_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl AlertConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            interval_secs: profiled_env_u64(p, "ALERT_INTERVAL_SECS", Self::default().interval_secs),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ── Planner ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Wall-clock length of one logical tick.
    pub tick_millis: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { tick_millis: 1000 }
    }
}

impl PlannerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            tick_millis: profiled_env_u64(p, "TICK_MILLIS", Self::default().tick_millis),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}
