//! Tracing subscriber installation.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ObservabilityConfig, ObservabilityError};

/// Initialize tracing from the environment (`RUST_LOG`, `STOREFRONT_LOG_FORMAT`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() -> Result<(), ObservabilityError> {
    init_with(&ObservabilityConfig::from_env()?);
    Ok(())
}

/// Initialize tracing with an explicit configuration.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_with(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match config.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    }
}
