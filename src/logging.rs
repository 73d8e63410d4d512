//! Tracing setup. The terminal belongs to the TUI, so events go to a daily
//! rolling file under the configured log directory instead of stdout.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "rims.log";

/// Install the global subscriber. Filtering follows `RUST_LOG` and defaults
/// to `info`. Keep the returned guard alive for the life of the process or
/// buffered lines are lost on exit.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    fs::create_dir_all(&config.log_dir).with_context(|| {
        format!(
            "failed to create log directory {}",
            config.log_dir.display()
        )
    })?;

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(guard)
}
