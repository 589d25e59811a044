//! Process-wide logging setup.
//!
//! Library code logs through both `tracing` (pipeline spans) and the `log`
//! facade (database, registry). A `tracing-subscriber` registry receives
//! both: `tracing_log::LogTracer` forwards `log` records into it.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::BrieflyError;

/// Builds the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, BrieflyError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| BrieflyError::Logging(format!("invalid log level '{}': {}", config.level, e))),
    }
}

/// Installs the global subscriber. Calling it twice returns an error.
pub fn init_logging(config: &LoggingConfig) -> Result<(), BrieflyError> {
    let filter = build_filter(config)?;

    let (plain, json) = if config.json {
        (None, Some(fmt::layer().json().with_current_span(true)))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| BrieflyError::Logging(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| BrieflyError::Logging(e.to_string()))?;

    tracing::debug!(json = config.json, level = %config.level, "logging initialised");
    Ok(())
}
