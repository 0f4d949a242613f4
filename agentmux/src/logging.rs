use agentmux_core::config;
use anyhow::{Context, Result};
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "agentmux.log";

pub fn default_log_file() -> PathBuf {
    config::cache_dir().join(LOG_FILE_NAME)
}

/// Level comes from `AGENTMUX_LOG` (error/warn/info/debug/trace),
/// defaulting to warn.
pub fn level_from_env() -> log::LevelFilter {
    std::env::var("AGENTMUX_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(log::LevelFilter::Warn)
}

/// Set up the rolling file logger in the cache dir and return the path
/// it writes to. The TUI owns the terminal, so nothing may log to
/// stderr after this.
pub fn init() -> Result<PathBuf> {
    let log_file = default_log_file();
    let dir = log_file.parent().context("log path has no parent")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    simple_log::file(log_file.to_string_lossy().into_owned(), level_from_env(), 10, 10)
        .map_err(|e| anyhow::anyhow!("logger setup failed: {e}"))?;
    log::debug!("logging to {}", log_file.display());
    Ok(log_file)
}
