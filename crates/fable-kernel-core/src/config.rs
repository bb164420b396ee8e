//! Kernel configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::compile::ProjectConfig;
use crate::error::{Error, Result};

/// How long and how often a round waits for the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Number of checks before the round times out.
    pub max_attempts: u32,

    /// Wait after the first unsuccessful check.
    pub initial_interval: Duration,

    /// Upper bound for the wait between checks.
    pub max_interval: Duration,

    /// Growth factor applied to the wait after each check.
    pub backoff: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(250),
            backoff: 1.5,
        }
    }
}

impl PollPolicy {
    /// A policy with fixed, short intervals. Meant for tests and fast local
    /// compilers.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            max_interval: interval,
            backoff: 1.0,
        }
    }

    /// Wait after `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff.max(1.0)).min(self.max_interval)
    }

    /// Total time spent sleeping if no check ever succeeds.
    pub fn worst_case(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut interval = self.initial_interval;
        for _ in 0..self.max_attempts {
            total += interval;
            interval = self.next_interval(interval);
        }
        total
    }
}

/// How to launch the external compiler.
#[derive(Debug, Clone)]
pub struct CompilerSettings {
    /// Whether the session spawns the compiler itself.
    ///
    /// Disable when a watcher is already running on the work directory.
    pub spawn: bool,

    /// Explicit path to `dotnet`. Falls back to `FABLE_KERNEL_DOTNET`, then PATH.
    pub dotnet: Option<PathBuf>,

    /// Arguments passed to `dotnet`. `{dir}` is replaced by the work directory.
    pub args: Vec<String>,

    /// Capacity of the diagnostic queue fed from compiler stderr.
    pub diagnostics_capacity: usize,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            spawn: true,
            dotnet: None,
            args: vec![
                "fable-py".to_string(),
                "{dir}".to_string(),
                "--watch".to_string(),
            ],
            diagnostics_capacity: 1024,
        }
    }
}

/// Configuration for a kernel session.
#[derive(Debug, Clone, Default)]
pub struct KernelConfig {
    /// Working directory shared with the compiler. `None` uses a temporary
    /// directory removed at shutdown.
    pub work_dir: Option<PathBuf>,

    /// External compiler settings.
    pub compiler: CompilerSettings,

    /// Explicit path to the Python interpreter. Falls back to
    /// `FABLE_KERNEL_PYTHON`, then `python3`/`python` on PATH.
    pub python: Option<PathBuf>,

    /// Polling budget for each round.
    pub poll: PollPolicy,

    /// Use filesystem notifications to wake the poll loop early.
    pub fs_events: bool,

    /// Project manifest contents.
    pub project: ProjectConfig,
}

impl KernelConfig {
    /// Default configuration with environment overrides applied.
    ///
    /// Recognized variables:
    /// - `FABLE_KERNEL_WORK_DIR`
    /// - `FABLE_KERNEL_DOTNET`
    /// - `FABLE_KERNEL_PYTHON`
    /// - `FABLE_KERNEL_POLL_ATTEMPTS`
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            fs_events: true,
            ..Self::default()
        };

        if let Ok(dir) = std::env::var("FABLE_KERNEL_WORK_DIR") {
            config.work_dir = Some(PathBuf::from(dir));
        }
        if let Ok(path) = std::env::var("FABLE_KERNEL_DOTNET") {
            config.compiler.dotnet = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("FABLE_KERNEL_PYTHON") {
            config.python = Some(PathBuf::from(path));
        }
        if let Ok(attempts) = std::env::var("FABLE_KERNEL_POLL_ATTEMPTS") {
            config.poll.max_attempts = parse_attempts(&attempts)?;
        }

        Ok(config)
    }

    /// Check values that would make every round fail.
    pub fn validate(&self) -> Result<()> {
        if self.poll.max_attempts == 0 {
            return Err(Error::Config("poll attempts must be at least 1".to_string()));
        }
        if self.poll.initial_interval > self.poll.max_interval {
            return Err(Error::Config(
                "initial poll interval exceeds the maximum interval".to_string(),
            ));
        }
        if self.compiler.spawn && self.compiler.args.is_empty() {
            return Err(Error::Config("compiler arguments are empty".to_string()));
        }
        Ok(())
    }
}

/// Parse a poll attempt count.
pub fn parse_attempts(value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "poll attempts must be a positive integer, got '{}'",
            value
        ))),
        Ok(n) => Ok(n),
    }
}
