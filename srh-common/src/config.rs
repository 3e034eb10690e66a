//! Harness configuration.
//!
//! All durable state lives under one base directory (the platform temp dir
//! by default) at well-known names, so every incarnation of the test
//! process finds the same records. Defaults can be overridden per scenario
//! through the builder-style setters or via `SRH_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::waiter::WaiterConfig;

/// Well-known file name of the phase record.
pub const STATUS_FILE_NAME: &str = "srh-restart-status.tmp";
/// Well-known file name of the restart guard record.
pub const GUARD_FILE_NAME: &str = "srh-restart-guard.tmp";
/// Well-known directory name of the service home.
pub const HOME_DIR_NAME: &str = "srh-service-home";

/// Default age past which a phase record is treated as absent.
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(10 * 60);
/// Default bound on restart-loop iterations.
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

/// Configuration for the restart harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory holding the status file, guard file, and service home.
    pub base_dir: PathBuf,
    /// Phase record file name under `base_dir`.
    pub status_file: String,
    /// Guard record file name under `base_dir`.
    pub guard_file: String,
    /// Service home directory name under `base_dir`.
    pub home_dir: String,
    /// Age past which a phase record is ignored and treated as absent.
    pub staleness_threshold: Duration,
    /// Restart-loop bound checked on every phase-0 reset.
    pub max_restarts: u32,
    /// Readiness-wait timing.
    pub waiter: WaiterConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir(),
            status_file: STATUS_FILE_NAME.to_string(),
            guard_file: GUARD_FILE_NAME.to_string(),
            home_dir: HOME_DIR_NAME.to_string(),
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            max_restarts: DEFAULT_MAX_RESTARTS,
            waiter: WaiterConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Defaults with `SRH_*` environment overrides applied. Unparseable
    /// values fall back to the default with a warning rather than aborting;
    /// a broken environment should not masquerade as a scenario failure.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("SRH_BASE_DIR")
            && !value.trim().is_empty()
        {
            config.base_dir = PathBuf::from(value);
        }
        if let Some(threshold) = env_duration("SRH_STALENESS_THRESHOLD") {
            config.staleness_threshold = threshold;
        }
        if let Some(max) = env_u32("SRH_MAX_RESTARTS") {
            config.max_restarts = max;
        }
        if let Some(timeout) = env_duration("SRH_READY_TIMEOUT") {
            config.waiter.timeout = timeout;
        }

        config
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_staleness_threshold(mut self, threshold: Duration) -> Self {
        self.staleness_threshold = threshold;
        self
    }

    pub fn with_waiter(mut self, waiter: WaiterConfig) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn status_path(&self) -> PathBuf {
        self.base_dir.join(&self.status_file)
    }

    pub fn guard_path(&self) -> PathBuf {
        self.base_dir.join(&self.guard_file)
    }

    pub fn home_path(&self) -> PathBuf {
        self.base_dir.join(&self.home_dir)
    }
}

fn env_duration(var: &str) -> Option<Duration> {
    let value = std::env::var(var).ok()?;
    match humantime::parse_duration(value.trim()) {
        Ok(duration) => Some(duration),
        Err(err) => {
            warn!(var, value, %err, "ignoring unparseable duration override");
            None
        }
    }
}

fn env_u32(var: &str) -> Option<u32> {
    let value = std::env::var(var).ok()?;
    match value.trim().parse::<u32>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(var, value, %err, "ignoring unparseable integer override");
            None
        }
    }
}
