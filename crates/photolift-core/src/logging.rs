//! Tracing subscriber setup
//!
//! Installs a `tracing-subscriber` fmt layer with an [`EnvFilter`]. The
//! `RUST_LOG` environment variable, when set, takes precedence over the
//! configured level.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Crates whose events follow the configured level; everything else is held
/// at `warn`.
const OWN_CRATES: &[&str] = &["photolift_core", "photolift_upload", "photolift_cache"];

/// Builds the event filter for `config`, honouring `RUST_LOG` when present.
pub fn build_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    filter_for_level(&config.level)
}

fn filter_for_level(level: &str) -> anyhow::Result<EnvFilter> {
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_CRATES.iter().map(|krate| format!("{krate}={level}")));
    EnvFilter::try_new(directives.join(","))
        .with_context(|| format!("invalid log level '{level}'"))
}

/// Installs the global subscriber.
///
/// # Errors
/// Fails if the level is not a valid filter directive or if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
            .context("failed to install tracing subscriber")?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true),
            )
            .try_init()
            .context("failed to install tracing subscriber")?,
    }

    tracing::debug!(level = %config.level, format = ?config.format, "Logging initialised");
    Ok(())
}
