//! Process-wide log subscriber setup.
//!
//! Library code logs through the `log` facade; [`init_logging`] forwards those
//! records into a `tracing_subscriber` registry so they share a filter and a
//! formatter with the `tracing` spans opened around drift checks.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{DriftwatchError, Result};

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            DriftwatchError::Logging(format!("invalid level '{}': {}", config.level, e))
        }),
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if let Err(e) = installed {
        // Another subscriber already owns the process (tests, embedding apps).
        log::debug!("Log subscriber not installed: {}", e);
    }
    // Already set when `try_init` bridged `log` itself.
    let _ = tracing_log::LogTracer::init();
    let _ = INITIALIZED.set(());

    Ok(())
}
