pub mod config;
pub mod models;
pub mod db;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and long-lived embedders.
///
/// Honors RUST_LOG when set, otherwise falls back to the crate default.
/// Call once at process start; a second call is a no-op error we swallow
/// so embedders with their own subscriber keep theirs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
