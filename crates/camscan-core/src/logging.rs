//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

const LOG_FILE_NAME: &str = "camscan.log";

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/camscan/logs/` so stdout stays free
/// for headless NDJSON output. Level is controlled by `CAMSCAN_LOG`.
///
/// # Examples
/// ```bash
/// CAMSCAN_LOG=debug camscan --fixture demo.toml
/// CAMSCAN_LOG=camscan_app=trace camscan --fixture demo.toml
/// ```
pub fn init() -> Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    let env_filter = EnvFilter::try_from_env("CAMSCAN_LOG")
        .unwrap_or_else(|_| EnvFilter::new("camscan=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| crate::error::Error::runtime(format!("logging already initialized: {e}")))?;

    tracing::info!("camscan starting, logs in {}", log_dir.display());

    Ok(())
}

fn log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("camscan").join("logs")
}
