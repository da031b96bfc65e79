//! Logging setup and configuration.
//!
//! The crate itself only logs through the `log` facade; this installs a
//! `tracing-subscriber` registry that picks those records up.

use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::BusError;

/// Sets up console logging, plus daily-rolling file output when
/// `config.logs_path` is set.
pub fn setup_logging(config: &Config) -> Result<(), BusError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eventbus=info"));

    let file_layer = match &config.logs_path {
        Some(path) => {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("eventbus")
                .filename_suffix("log")
                .max_log_files(7)
                .build(path)
                .map_err(|e| BusError::LoggingSetup {
                    msg: format!(
                        "Failed to initialize rolling file appender at '{}': {}",
                        path.to_string_lossy(),
                        e
                    ),
                })?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Leak the guard so buffered lines are flushed for the whole process.
            std::mem::forget(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(file_layer)
        .try_init()
        .map_err(|e| BusError::LoggingSetup { msg: e.to_string() })
}
