//! Configuration for the kernel bridge and the society scheduler.
//!
//! The core receives these values; it owns none of the policy behind them.
//! Consumers typically deserialize them from a file or build them from CLI
//! flags and hand them in.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default startup handshake window in seconds.
pub const DEFAULT_STARTUP_TIMEOUT: u64 = 30;
/// Default per-call timeout in seconds.
pub const DEFAULT_CALL_TIMEOUT: u64 = 30;
/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE: u64 = 5;

/// Configuration for spawning and talking to the symbolic worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Worker executable (e.g. "lein", "python", "node").
    pub command: String,
    /// Arguments passed to the worker.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the worker. `None` inherits the parent's.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Seconds to wait for the readiness line before aborting startup.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    /// Default per-call timeout in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Seconds to wait for graceful exit before killing the worker.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_startup_timeout() -> u64 {
    DEFAULT_STARTUP_TIMEOUT
}

fn default_call_timeout() -> u64 {
    DEFAULT_CALL_TIMEOUT
}

fn default_shutdown_grace() -> u64 {
    DEFAULT_SHUTDOWN_GRACE
}

impl BridgeConfig {
    /// Create a config for the given worker command with default timeouts.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Builder: set worker arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the worker's working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Builder: set the startup handshake window.
    pub fn with_startup_timeout(mut self, secs: u64) -> Self {
        self.startup_timeout_secs = secs;
        self
    }

    /// Builder: set the default per-call timeout.
    pub fn with_call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    /// Builder: set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, secs: u64) -> Self {
        self.shutdown_grace_secs = secs;
        self
    }

    /// Startup handshake window as a `Duration`.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Default per-call timeout as a `Duration`.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Shutdown grace period as a `Duration`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Configuration for the society scheduler and agent budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocietyConfig {
    /// Maximum number of cycles for a continuous run.
    pub max_cycles: u64,
    /// Pause between cycles, in milliseconds.
    pub cycle_delay_ms: u64,
    /// Energy burned by each agent per tick.
    pub tick_cost: f64,
    /// Energy each agent starts with.
    pub initial_energy: f64,
}

impl Default for SocietyConfig {
    fn default() -> Self {
        Self {
            max_cycles: 20,
            cycle_delay_ms: 3000,
            tick_cost: 0.1,
            initial_energy: 100.0,
        }
    }
}

impl SocietyConfig {
    /// Inter-cycle pause as a `Duration`.
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }
}
