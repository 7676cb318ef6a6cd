//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{IntakeConfig, LogFormat};

/// Installs the global tracing subscriber.
///
/// The filter comes from `config.log_filter`, falling back to `info` when
/// the directive does not parse. Returns false if a subscriber was already
/// installed, in which case nothing changes.
pub fn init_tracing(config: &IntakeConfig) -> bool {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    };

    installed.is_ok()
}
