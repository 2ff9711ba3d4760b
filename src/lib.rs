pub mod commands;
pub mod config;
pub mod core_state; // Shared state behind the host-facing commands
pub mod models;
pub mod pipeline;
pub mod services; // External HTTP boundaries: scanner bridge, registry, save, records

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to [`config::default_log_filter`].
/// Safe to call more than once: later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
