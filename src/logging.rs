use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::fs;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "daybook.log";

/// Installs the global subscriber, writing to a daily rolling file so the
/// terminal UI is never drawn over. `RUST_LOG` takes precedence over the
/// configured level; each `-v` bumps the level one step.
///
/// The returned guard flushes pending lines when dropped and must be held
/// for the life of the process.
pub fn init_tracing(config: &Config, verbose: u8) -> Result<WorkerGuard> {
    let level = match verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let dir = config.resolved_log_dir()?;
    fs::create_dir_all(&dir).with_context(|| format!("creating log directory {:?}", dir))?;
    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    debug!(log_dir = %dir.display(), level, "logging initialized");
    Ok(guard)
}
