//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

/// Default idle re-arm period in seconds (one hour).
pub const DEFAULT_IDLE_REARM_SECS: u64 = 3600;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long the reaper sleeps when no entries are stored before re-checking
    pub idle_rearm: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `IDLE_REARM_SECS` - Reaper idle period in seconds (default: 3600)
    pub fn from_env() -> Self {
        let idle_rearm_secs = env::var("IDLE_REARM_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_IDLE_REARM_SECS);

        Self::default().with_idle_rearm(Duration::from_secs(idle_rearm_secs))
    }

    /// Sets the idle re-arm period.
    ///
    /// A zero period would spin the reaper, so it is clamped to one second.
    pub fn with_idle_rearm(mut self, idle_rearm: Duration) -> Self {
        self.idle_rearm = idle_rearm.max(Duration::from_secs(1));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_rearm: Duration::from_secs(DEFAULT_IDLE_REARM_SECS),
        }
    }
}
