use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LoggingConfig};

/// Log filter: `RUST_LOG` or "info", with enigo forced to error-only
/// either way so transcribed text never leaks into the log via its
/// key-event debug output.
fn build_filter() -> Result<EnvFilter> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    Ok(filter.add_directive(
        "enigo=error"
            .parse()
            .context("failed to parse log directive")?,
    ))
}

/// Initialize logging: stdout always, plus an append-mode plain-text log
/// file when enabled in config.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter()?;

    let stdout_layer = fmt::layer().with_target(false);

    if !config.log_to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init()
            .context("failed to initialize logging")?;
        return Ok(());
    }

    let log_path = Config::expand_path(&config.log_path)?;
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("failed to open log file")?;

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("failed to initialize logging")?;

    tracing::info!("logging to {}", log_path.display());

    Ok(())
}
