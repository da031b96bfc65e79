//! Environment-driven configuration.
//!
//! [`Config::new`] reads the process environment as it is.
//! [`Config::from_env`] loads a `.env` file first.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::BusError;

/// Default number of workers kept alive while idle.
pub const DEFAULT_CORE_THREADS: usize = 3;
/// Default upper bound of concurrently running workers.
pub const DEFAULT_MAX_THREADS: usize = 8;
/// Default idle time after which workers above the core count exit.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5 * 60);
/// Default worker thread name prefix. Threads are named `{prefix}-{n}`.
pub const DEFAULT_THREAD_PREFIX: &str = "EventBus";

/// Sizing of the background worker pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub core_threads: usize,
    pub max_threads: usize,
    pub keep_alive: Duration,
    pub thread_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_threads: DEFAULT_CORE_THREADS,
            max_threads: DEFAULT_MAX_THREADS,
            keep_alive: DEFAULT_KEEP_ALIVE,
            thread_prefix: DEFAULT_THREAD_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    /// Rejects sizes the pool cannot honor.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.core_threads == 0 || self.max_threads == 0 {
            return Err(BusError::InvalidConfig {
                msg: format!(
                    "thread counts must be positive (core={}, max={})",
                    self.core_threads, self.max_threads
                ),
            });
        }
        if self.core_threads > self.max_threads {
            return Err(BusError::InvalidConfig {
                msg: format!(
                    "core threads ({}) exceed max threads ({})",
                    self.core_threads, self.max_threads
                ),
            });
        }
        if self.keep_alive.is_zero() {
            return Err(BusError::InvalidConfig {
                msg: "keep-alive must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub pool: PoolConfig,
    pub logs_path: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            pool: PoolConfig {
                core_threads: env_or("EVENTBUS_CORE_THREADS", DEFAULT_CORE_THREADS),
                max_threads: env_or("EVENTBUS_MAX_THREADS", DEFAULT_MAX_THREADS),
                keep_alive: std::env::var("EVENTBUS_KEEP_ALIVE_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .map_or(DEFAULT_KEEP_ALIVE, Duration::from_secs),
                thread_prefix: std::env::var("EVENTBUS_THREAD_PREFIX")
                    .unwrap_or(DEFAULT_THREAD_PREFIX.to_string()),
            },
            logs_path: std::env::var("EVENTBUS_LOGS_PATH").ok().map(PathBuf::from),
        }
    }

    /// Loads `.env` (if present) into the environment, then reads it.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::new()
    }
}

fn env_or(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
