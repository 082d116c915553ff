//! Tracing setup
//!
//! Logs always go to stdout. When NOTIFY_LOG_DIR is set, a daily
//! rolling file appender is added alongside; the returned guard must be
//! kept alive for the lifetime of the process so buffered log lines are
//! flushed.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "jenkins_notify";

/// Keeps the file appender's worker alive. Dropping it flushes and
/// stops file logging.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber. Honors RUST_LOG for filtering and
/// NOTIFY_LOG_DIR for an optional log file directory.
pub fn init() -> LogGuard {
    let log_dir = std::env::var("NOTIFY_LOG_DIR").ok().map(PathBuf::from);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir).expect("Failed to create log directory");
            let file_appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer())
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();

            LogGuard {
                _file_guard: Some(guard),
            }
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer())
                .init();

            LogGuard { _file_guard: None }
        }
    }
}
