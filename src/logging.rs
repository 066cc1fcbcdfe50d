//! Structured logging setup.
//!
//! The stores and the coordinator log through `tracing` macros. The host
//! console is the user-visible channel, so the plugin installs a plain `fmt`
//! subscriber once at load time. Hosts that already installed their own
//! subscriber keep it.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Environment variable overriding [`LoggingConfig::filter`].
pub const LOG_ENV: &str = "CNC_SUITE_LOG";

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (by the host or a
/// previous plugin load); that is not an error.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(config.with_target)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}
