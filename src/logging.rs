// src/logging.rs

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";
pub const VERBOSE_FILTER: &str = "info,ttd=debug";

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logging(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
    if installed.is_ok() {
        tracing::debug!("logging initialized");
    }
}
