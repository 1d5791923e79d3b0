//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber: `RUST_LOG` when set, `info` otherwise.
///
/// Does nothing when the process already has a global subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
